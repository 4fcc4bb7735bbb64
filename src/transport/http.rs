//! HTTP transport over reqwest.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use super::{ClientConfig, Method, RawResponse, Request, Transport};
use crate::{Error, Result};

/// Sends requests to a Dataplane API server.
///
/// Every request carries `Authorization: Basic <credential>` and
/// `Content-Type: application/json`. Clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&config.credential.header_value())
            .map_err(|e| Error::Internal(format!("invalid credential: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<RawResponse> {
        let mut builder = self.client.request(to_reqwest(request.method), &request.url);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Internal(format!("{} {}: {e}", request.method, request.url)))?;
        let status = response.status().as_u16();
        // The body carries the server's diagnostic even on error statuses.
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Internal(format!("reading response body: {e}")))?;

        Ok(RawResponse { status, body })
    }
}
