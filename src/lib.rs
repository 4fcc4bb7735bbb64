//! # haproxy-dataplane: Transactional HAProxy Dataplane API Client
//!
//! A client for the versioned, transaction-scoped configuration API of the
//! HAProxy Dataplane. Configuration resources (backends, frontends, binds,
//! servers) can only be edited inside a transaction, and a transaction is
//! gated by an optimistic-concurrency version number.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `Transport` is the contract between the protocol and the wire
//! 2. **Explicit scope**: every resource call takes its transaction id; there is
//!    no hidden "current transaction"
//! 3. **One CRUD implementation**: `Resources<R>` is generic over the resource kind
//! 4. **Closed error taxonomy**: callers branch on `Error` variants, never on text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use haproxy_dataplane::{Backend, BalanceAlgorithm, Client, ClientConfig, Credential, Mode};
//!
//! # async fn example() -> haproxy_dataplane::Result<()> {
//! let config = ClientConfig::new("http://127.0.0.1:5555/v3", Credential::basic("admin", "admin"));
//! let client = Client::connect(&config)?;
//!
//! let version = client.get_version().await?;
//! let tx = client.create_transaction(version).await?.expect("transaction body");
//!
//! let web = Backend::new("web").with_mode(Mode::Http).with_balance(BalanceAlgorithm::RoundRobin);
//! client.backends().add(&tx.id, &web).await?;
//!
//! match client.commit_transaction(&tx.id).await {
//!     Ok(_) => {}
//!     // Another commit won: start over from a fresh version.
//!     Err(e) if e.requires_new_version() => {}
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! | Transport | Feature | Description |
//! |-----------|---------|-------------|
//! | Http | `http` (default) | reqwest over HTTP(S) |
//! | Memory | (always) | In-process reference server for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod endpoint;
pub mod model;
pub mod resource;
pub mod transport;
pub mod tx;

// ============================================================================
// Re-exports: Model (the wire shapes)
// ============================================================================

pub use model::{Backend, Balance, BalanceAlgorithm, Bind, Frontend, Mode, Server, Toggle};

// ============================================================================
// Re-exports: Transport
// ============================================================================

#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ClientConfig, Credential, MemoryTransport, Method, RawResponse, Request, Transport};

// ============================================================================
// Re-exports: Transactions and resources
// ============================================================================

pub use resource::{NestedResource, Resource, Resources, TopLevelResource};
pub use tx::{Transaction, TransactionId, TransactionStatus, Version};

use bytes::Bytes;
use tracing::debug;

use endpoint::Endpoints;

// ============================================================================
// Top-level Client handle
// ============================================================================

/// The primary entry point. A `Client` wraps a transport and the
/// immutable endpoint configuration.
///
/// It holds no per-transaction state, so one value can be shared across
/// tasks without locking.
#[derive(Debug, Clone)]
pub struct Client<T: Transport> {
    transport: T,
    endpoints: Endpoints,
}

impl<T: Transport> Client<T> {
    /// Create a client over an arbitrary transport.
    ///
    /// Fails when `config.base_url` is not an absolute URL.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self> {
        Ok(Self {
            transport,
            endpoints: Endpoints::new(&config.base_url, &config.service_root)?,
        })
    }

    /// Access the underlying transport (for advanced use).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch the current version and open a transaction against it.
    pub async fn begin(&self) -> Result<OpenTransaction<'_, T>> {
        let version = self.get_version().await?;
        let transaction = self
            .create_transaction(version)
            .await?
            .ok_or_else(|| Error::InvalidResponse("empty body for created transaction".into()))?;
        Ok(OpenTransaction { client: self, transaction })
    }

    /// Send one request and return the raw response, status unmapped.
    pub(crate) async fn send(&self, method: Method, url: String, body: Option<Bytes>) -> Result<RawResponse> {
        debug!(%method, %url, "dataplane request");
        let request = Request { method, url, body };
        let response = self.transport.send(request).await?;
        debug!(status = response.status, bytes = response.body.len(), "dataplane response");
        Ok(response)
    }

    /// Send one request and map a non-2xx status to its error kind.
    pub(crate) async fn call(&self, method: Method, url: String, body: Option<Bytes>) -> Result<Bytes> {
        self.send(method, url, body).await?.into_result()
    }
}

#[cfg(feature = "http")]
impl Client<HttpTransport> {
    /// Client over HTTP(S).
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new(config)?)
    }
}

/// In-process server for testing and embedding.
impl Client<MemoryTransport> {
    pub fn open_memory() -> Result<Self> {
        let config = ClientConfig::new("memory://dataplane", Credential::from_encoded(""));
        Self::with_transport(&config, MemoryTransport::new())
    }
}

/// An open transaction together with the client that opened it.
///
/// Dropping the handle does not close the transaction server-side; call
/// [`close`](Self::close) to discard it.
pub struct OpenTransaction<'c, T: Transport> {
    client: &'c Client<T>,
    transaction: Transaction,
}

impl<'c, T: Transport> OpenTransaction<'c, T> {
    pub fn id(&self) -> &TransactionId {
        &self.transaction.id
    }

    /// Version the transaction was opened against, when the server reported it.
    pub fn version(&self) -> Option<Version> {
        self.transaction.version
    }

    pub fn client(&self) -> &'c Client<T> {
        self.client
    }

    /// Re-poll the transaction status.
    pub async fn refresh(&self) -> Result<Option<Transaction>> {
        self.client.get_transaction(&self.transaction.id).await
    }

    pub async fn commit(self) -> Result<Option<Transaction>> {
        self.client.commit_transaction(&self.transaction.id).await
    }

    pub async fn close(self) -> Result<String> {
        self.client.close_transaction(&self.transaction.id).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Closed error taxonomy.
///
/// Status-derived kinds (`NotFound`, `BadRequest`, `Unauthorized`,
/// `Conflict`, `Unknown`) carry the raw response body as their message.
/// `BadRequest` is also raised locally when a required parameter is
/// missing. `InvalidResponse` and `Internal` are client-side failures and
/// never come from a server status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("commit failed for transaction {transaction_id}: {message}")]
    CommitFailed { transaction_id: TransactionId, message: String },

    #[error("unknown error (status {status}): {message}")]
    Unknown { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map an HTTP status and body to an error kind. 2xx maps to `None`.
    pub fn from_status(status: u16, body: &[u8]) -> Option<Self> {
        if (200..300).contains(&status) {
            return None;
        }
        let message = String::from_utf8_lossy(body).into_owned();
        Some(match status {
            400 => Error::BadRequest(message),
            401 => Error::Unauthorized(message),
            404 => Error::NotFound(message),
            409 => Error::Conflict(message),
            status => Error::Unknown { status, message },
        })
    }

    pub fn is_not_found(&self) -> bool { matches!(self, Error::NotFound(_)) }
    pub fn is_bad_request(&self) -> bool { matches!(self, Error::BadRequest(_)) }
    pub fn is_unauthorized(&self) -> bool { matches!(self, Error::Unauthorized(_)) }
    pub fn is_conflict(&self) -> bool { matches!(self, Error::Conflict(_)) }
    pub fn is_commit_failed(&self) -> bool { matches!(self, Error::CommitFailed { .. }) }
    pub fn is_unknown(&self) -> bool { matches!(self, Error::Unknown { .. }) }
    pub fn is_invalid_response(&self) -> bool { matches!(self, Error::InvalidResponse(_)) }
    pub fn is_internal(&self) -> bool { matches!(self, Error::Internal(_)) }

    /// HTTP status behind a status-derived error.
    ///
    /// `BadRequest` reports 400 whether it came from the server or from a
    /// local precondition check.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::NotFound(_) => Some(404),
            Error::BadRequest(_) => Some(400),
            Error::Unauthorized(_) => Some(401),
            Error::Conflict(_) => Some(409),
            Error::Unknown { status, .. } => Some(*status),
            Error::CommitFailed { .. } | Error::InvalidResponse(_) | Error::Internal(_) => None,
        }
    }

    /// Transaction whose commit was rejected.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            Error::CommitFailed { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }

    /// Server or local message, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::NotFound(m)
            | Error::BadRequest(m)
            | Error::Unauthorized(m)
            | Error::Conflict(m)
            | Error::InvalidResponse(m)
            | Error::Internal(m) => m,
            Error::CommitFailed { message, .. } | Error::Unknown { message, .. } => message,
        }
    }

    /// The staged edits lost a race: restart from a fresh version.
    pub fn requires_new_version(&self) -> bool {
        matches!(self, Error::CommitFailed { .. } | Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(Error::from_status(200, b"").is_none());
        assert!(Error::from_status(204, b"").is_none());
        assert_eq!(Error::from_status(400, b"bad"), Some(Error::BadRequest("bad".into())));
        assert_eq!(Error::from_status(401, b"no"), Some(Error::Unauthorized("no".into())));
        assert_eq!(Error::from_status(404, b"gone"), Some(Error::NotFound("gone".into())));
        assert_eq!(Error::from_status(409, b"dup"), Some(Error::Conflict("dup".into())));
        assert_eq!(
            Error::from_status(503, b"busy"),
            Some(Error::Unknown { status: 503, message: "busy".into() })
        );
        assert!(Error::from_status(302, b"").unwrap().is_unknown());
        assert!(Error::from_status(403, b"").unwrap().is_unknown());
    }

    #[test]
    fn test_status_code_extraction() {
        assert_eq!(Error::from_status(418, b"").unwrap().status_code(), Some(418));
        assert_eq!(Error::NotFound(String::new()).status_code(), Some(404));
        assert_eq!(Error::Internal("dns".into()).status_code(), None);
        assert_eq!(Error::InvalidResponse("json".into()).status_code(), None);
    }

    #[test]
    fn test_commit_failed_carries_transaction() {
        let err = Error::CommitFailed {
            transaction_id: TransactionId::from("tx-1"),
            message: "outdated".into(),
        };
        assert!(err.is_commit_failed());
        assert!(err.requires_new_version());
        assert_eq!(err.transaction_id(), Some(&TransactionId::from("tx-1")));
        assert_eq!(err.to_string(), "commit failed for transaction tx-1: outdated");
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(Error::NotFound("x".into()).to_string(), "not found: x");
        assert_eq!(
            Error::Unknown { status: 500, message: "boom".into() }.to_string(),
            "unknown error (status 500): boom"
        );
        assert!(!Error::Unauthorized("x".into()).requires_new_version());
    }

    #[test]
    fn test_bad_base_url_is_rejected_at_construction() {
        let config = ClientConfig::new("127.0.0.1:5555", Credential::from_encoded("x"));
        let err = Client::with_transport(&config, MemoryTransport::new()).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_client_is_shareable() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Client<MemoryTransport>>();
    }
}
