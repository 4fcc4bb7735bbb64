//! Transaction management.
//!
//! The optimistic-concurrency protocol: fetch the configuration
//! [`Version`], open a [`Transaction`] against it, stage edits under its
//! id, then commit or close. Conflicts with concurrent commits surface at
//! commit time as [`Error::CommitFailed`], never at creation.
//!
//! ```text
//! in_progress --commit ok-------------> success
//! in_progress --commit rejected-------> failed | outdated
//! in_progress --another commit wins---> outdated   (seen via get_transaction)
//! in_progress --close-----------------> (discarded)
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoint::VERSION_PARAM;
use crate::transport::{Method, Transport};
use crate::{Client, Error, Result};

/// Server-side configuration version. Advanced by one on every commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Parse a version response body: a decimal integer, surrounding
    /// whitespace allowed.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::InvalidResponse(format!("version body is not UTF-8: {e}")))?;
        text.trim()
            .parse::<u64>()
            .map(Version)
            .map_err(|e| Error::InvalidResponse(format!("version body {:?}: {e}", text.trim())))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transaction identifier issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject the empty id before any URL is built with it.
    pub(crate) fn require(&self) -> Result<&str> {
        if self.0.is_empty() {
            Err(Error::BadRequest("transaction_id is required".into()))
        } else {
            Ok(&self.0)
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Transaction status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    InProgress,
    Success,
    Failed,
    /// The backing version was superseded before commit.
    Outdated,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::InProgress)
    }

    /// `failed` and `outdated` both mean the staged edits did not land.
    pub fn is_failure(&self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Outdated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::InProgress => "in_progress",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Outdated => "outdated",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-side staging area for resource edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub status: TransactionStatus,
    /// Version the transaction was opened against.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

/// Statuses a commit endpoint uses to reject a transaction.
const COMMIT_REJECTED: [u16; 4] = [400, 406, 409, 422];

/// Status mapping of the transaction endpoints.
///
/// Only 401 and 404 have a dedicated kind here; every other non-2xx status
/// is `Unknown` with the status kept.
fn transaction_error(status: u16, body: &[u8]) -> Option<Error> {
    match Error::from_status(status, body)? {
        err @ (Error::NotFound(_) | Error::Unauthorized(_)) => Some(err),
        err => Some(Error::Unknown { status, message: err.message().to_string() }),
    }
}

// ============================================================================
// Version/Transaction Manager
// ============================================================================

impl<T: Transport> Client<T> {
    /// Fetch the current configuration version.
    pub async fn get_version(&self) -> Result<Version> {
        let url = self.endpoints().version().build();
        let body = self.call(Method::Get, url, None).await?;
        let version = Version::parse(&body)?;
        debug!(%version, "fetched configuration version");
        Ok(version)
    }

    /// Open a transaction against `version`.
    ///
    /// A stale version is accepted here; the conflict surfaces at commit.
    pub async fn create_transaction(&self, version: Version) -> Result<Option<Transaction>> {
        let url = self.endpoints().transactions().query(VERSION_PARAM, version).build();
        let body = self.call_transaction(Method::Post, url).await?;
        let tx: Option<Transaction> = decode_optional(&body)?;
        if let Some(tx) = &tx {
            debug!(transaction_id = %tx.id, %version, "opened transaction");
        }
        Ok(tx)
    }

    /// Poll the status of a transaction.
    pub async fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let url = self.endpoints().transaction(id.require()?).build();
        let body = self.call_transaction(Method::Get, url).await?;
        decode_optional(&body)
    }

    /// Commit a transaction, applying its staged edits atomically.
    ///
    /// A rejected commit is reported as [`Error::CommitFailed`] carrying
    /// `id`. The staged edits were made against a baseline that may no
    /// longer hold, so callers restart from [`Client::get_version`] rather
    /// than re-issuing the commit.
    pub async fn commit_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let url = self.endpoints().transaction(id.require()?).build();
        let response = self.send(Method::Put, url, None).await?;

        if let Some(err) = transaction_error(response.status, &response.body) {
            if COMMIT_REJECTED.contains(&response.status) {
                debug!(transaction_id = %id, status = response.status, "commit rejected");
                return Err(Error::CommitFailed {
                    transaction_id: id.clone(),
                    message: err.message().to_string(),
                });
            }
            return Err(err);
        }

        let tx: Option<Transaction> = decode_optional(&response.body)?;
        if let Some(tx) = &tx {
            if tx.status.is_failure() {
                debug!(transaction_id = %id, status = %tx.status, "commit reported failure");
                return Err(Error::CommitFailed {
                    transaction_id: id.clone(),
                    message: format!("transaction status {}", tx.status),
                });
            }
            debug!(transaction_id = %id, status = %tx.status, "committed transaction");
        }
        Ok(tx)
    }

    /// Discard an in-progress transaction without committing.
    ///
    /// Returns the raw acknowledgment text; its schema is informal.
    pub async fn close_transaction(&self, id: &TransactionId) -> Result<String> {
        let url = self.endpoints().transaction(id.require()?).build();
        let body = self.call(Method::Delete, url, None).await?;
        debug!(transaction_id = %id, "closed transaction");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn call_transaction(&self, method: Method, url: String) -> Result<Bytes> {
        let response = self.send(method, url, None).await?;
        match transaction_error(response.status, &response.body) {
            Some(err) => Err(err),
            None => Ok(response.body),
        }
    }
}

/// Decode a JSON body, treating an empty body as an absent result.
pub(crate) fn decode_optional<R: serde::de::DeserializeOwned>(body: &[u8]) -> Result<Option<R>> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}
