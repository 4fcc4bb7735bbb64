//! URL construction for Dataplane endpoints.
//!
//! Every request URL is assembled here so that the path convention and the
//! query-string encoding live in one place:
//!
//! ```text
//! {base_url}{service_root}/configuration/version
//! {base_url}{service_root}/transactions[/{id}]
//! {base_url}{service_root}/configuration/{plural}[/{name}]
//! {base_url}{service_root}/configuration/{parent_plural}/{parent}/{plural}[/{name}]
//! ```
//!
//! Callers pass raw names and ids; `url` percent-encodes path segments and
//! form-encodes query pairs.

use url::Url;

use crate::{Error, Result};

/// Default path prefix of the HAProxy service on a Dataplane API server.
pub const DEFAULT_SERVICE_ROOT: &str = "/services/haproxy";

/// Query parameter carrying the transaction scope of a resource request.
pub const TRANSACTION_ID_PARAM: &str = "transaction_id";

/// Query parameter carrying the version a transaction is opened against.
pub const VERSION_PARAM: &str = "version";

// ============================================================================
// Endpoints
// ============================================================================

/// Parsed `base_url` + `service_root` that every URL starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    root: Url,
}

impl Endpoints {
    /// Parse `base_url` and append the segments of `service_root`.
    ///
    /// Fails with [`Error::Internal`] when `base_url` is not an absolute
    /// URL that can carry a path.
    pub fn new(base_url: &str, service_root: &str) -> Result<Self> {
        let mut root = Url::parse(base_url)
            .map_err(|e| Error::Internal(format!("invalid base URL {base_url:?}: {e}")))?;
        {
            let mut segments = root
                .path_segments_mut()
                .map_err(|()| Error::Internal(format!("base URL {base_url:?} cannot carry a path")))?;
            segments
                .pop_if_empty()
                .extend(service_root.split('/').filter(|s| !s.is_empty()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &str {
        self.root.as_str()
    }

    pub fn version(&self) -> UrlBuilder {
        UrlBuilder::new(&self.root).segment("configuration").segment("version")
    }

    pub fn transactions(&self) -> UrlBuilder {
        UrlBuilder::new(&self.root).segment("transactions")
    }

    pub fn transaction(&self, id: &str) -> UrlBuilder {
        self.transactions().segment(id)
    }

    /// Collection URL for a resource kind, optionally nested under a parent.
    pub fn collection(&self, collection: &str, parent: Option<(&str, &str)>) -> UrlBuilder {
        let mut url = UrlBuilder::new(&self.root).segment("configuration");
        if let Some((parent_collection, parent_name)) = parent {
            url = url.segment(parent_collection).segment(parent_name);
        }
        url.segment(collection)
    }

    /// Item URL: the collection URL followed by the resource name.
    pub fn item(&self, collection: &str, parent: Option<(&str, &str)>, name: &str) -> UrlBuilder {
        self.collection(collection, parent).segment(name)
    }
}

// ============================================================================
// UrlBuilder
// ============================================================================

/// Incremental URL builder over a validated root.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    url: Url,
}

impl UrlBuilder {
    fn new(root: &Url) -> Self {
        Self { url: root.clone() }
    }

    pub fn segment(mut self, segment: &str) -> Self {
        // The root was checked to carry a path in `Endpoints::new`.
        if let Ok(mut segments) = self.url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.url.query_pairs_mut().append_pair(key, &value.to_string());
        self
    }

    pub fn build(self) -> String {
        self.url.into()
    }
}
