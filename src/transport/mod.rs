//! # Transport Trait
//!
//! The leaf of the client: issue one request, return the raw status and
//! body. Status-to-error mapping happens above this layer
//! (see [`RawResponse::into_result`]), so a transport never interprets
//! what the server said.
//!
//! ## Implementations
//!
//! | Transport | Module | Description |
//! |-----------|--------|-------------|
//! | `HttpTransport` | `http` | reqwest over HTTP(S) (feature `http`) |
//! | `MemoryTransport` | `memory` | In-process reference Dataplane server for testing/embedding |

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;

use crate::endpoint::DEFAULT_SERVICE_ROOT;
use crate::{Error, Result};

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use memory::MemoryTransport;

// ============================================================================
// Client Configuration
// ============================================================================

/// Static Basic-auth credential. Never refreshed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Wrap an already base64-encoded `user:password` token.
    pub fn from_encoded(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    /// Encode `user:password` with the standard base64 alphabet.
    pub fn basic(user: &str, password: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        Self { token }
    }

    /// The encoded token, without the `Basic ` scheme prefix.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Basic {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Connection settings for a Dataplane API server.
///
/// Immutable once a client is built from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme, authority and API prefix, e.g. `http://127.0.0.1:5555/v3`.
    pub base_url: String,
    /// Path of the HAProxy service under `base_url`.
    pub service_root: String,
    pub credential: Credential,
    /// Whole-request timeout handed to the HTTP transport.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into(),
            service_root: DEFAULT_SERVICE_ROOT.to_string(),
            credential,
            timeout: None,
        }
    }

    pub fn with_service_root(mut self, service_root: impl Into<String>) -> Self {
        self.service_root = service_root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// HTTP methods used by the Dataplane protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully-formed request. The URL already carries every query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Serialized JSON body, if any.
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), body: None }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Status code and fully-read body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Map a non-2xx status to its error kind; hand back the body otherwise.
    pub fn into_result(self) -> Result<Bytes> {
        match Error::from_status(self.status, &self.body) {
            Some(err) => Err(err),
            None => Ok(self.body),
        }
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// The contract between the client and the wire.
///
/// Implementations must:
/// - attach the Basic `Authorization` header and `Content-Type: application/json`
///   (network transports only),
/// - read the body to completion regardless of status,
/// - report network-level failures as [`Error::Internal`], never as a
///   status-derived kind,
/// - never retry and never log.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: Request) -> Result<RawResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_credential_encoding() {
        let cred = Credential::basic("admin", "admin");
        assert_eq!(cred.token(), "YWRtaW46YWRtaW4=");
        assert_eq!(cred.header_value(), "Basic YWRtaW46YWRtaW4=");
        assert_eq!(cred, Credential::from_encoded("YWRtaW46YWRtaW4="));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::basic("admin", "hunter2");
        assert_eq!(format!("{cred:?}"), "Credential(***)");
        let config = ClientConfig::new("http://h", cred);
        assert!(!format!("{config:?}").contains(config.credential.token()));
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("http://h:5555/v3", Credential::from_encoded("x"))
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.service_root, DEFAULT_SERVICE_ROOT);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_raw_response_into_result() {
        let ok = RawResponse::new(204, Bytes::new());
        assert!(ok.is_success());
        assert_eq!(ok.into_result().unwrap(), Bytes::new());

        let err = RawResponse::new(409, "already exists").into_result().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.message(), "already exists");
    }
}
