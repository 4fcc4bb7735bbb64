//! In-memory Dataplane server.
//!
//! This is the reference implementation of `Transport`. It answers
//! requests the way a Dataplane API server does, against state held in
//! the process.
//!
//! ## Semantics
//!
//! - The committed configuration starts empty at version 1.
//! - Opening a transaction snapshots the committed configuration. Resource
//!   requests scoped to the transaction read and write that snapshot, so
//!   reads inside a transaction see its staged edits.
//! - A version newer than the current one is unknown (404). An older one is
//!   accepted and fails at commit (406), which marks the transaction
//!   `outdated`.
//! - A successful commit replaces the committed configuration with the
//!   staged one, advances the version, and marks every other open
//!   transaction `outdated`. Outdated transactions keep accepting edits
//!   until a commit is attempted; a refused commit releases the staged copy
//!   and later edits get 406.
//!
//! ## Test hooks
//!
//! - `push_response()` / `push_failure()` script what the next `send()`
//!   returns, ahead of the server logic.
//! - Every request is logged (`requests()`, `request_count()`), including
//!   scripted ones, so a test can assert that no call was made.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::{Map, Value as Json, json};
use url::Url;

use super::{Method, RawResponse, Request, Transport};
use crate::endpoint::{DEFAULT_SERVICE_ROOT, TRANSACTION_ID_PARAM, VERSION_PARAM};
use crate::tx::{Transaction, TransactionId, TransactionStatus, Version};
use crate::{Error, Result};

/// Collection → name → object.
type Config = BTreeMap<CollectionKey, BTreeMap<String, Json>>;

/// A top-level collection, or a child collection of one named parent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CollectionKey {
    /// `(parent collection, parent name)`.
    parent: Option<(String, String)>,
    collection: String,
}

impl CollectionKey {
    fn top_level(collection: &str) -> Self {
        Self { parent: None, collection: collection.to_string() }
    }

    fn nested(parent_collection: &str, parent: &str, collection: &str) -> Self {
        Self {
            parent: Some((parent_collection.to_string(), parent.to_string())),
            collection: collection.to_string(),
        }
    }

    fn is_child_of(&self, parent_collection: &str, parent: &str) -> bool {
        matches!(&self.parent, Some((c, p)) if c == parent_collection && p == parent)
    }
}

const TOP_LEVEL: [&str; 2] = ["backends", "frontends"];
const NESTED: [(&str, &str); 2] = [("frontends", "binds"), ("backends", "servers")];

// ============================================================================
// MemoryTransport
// ============================================================================

/// In-process Dataplane server. Clones share the same server state.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    root: Vec<String>,
    state: Mutex<ServerState>,
    scripted: Mutex<VecDeque<Scripted>>,
    log: Mutex<Vec<Request>>,
}

enum Scripted {
    Response(RawResponse),
    Failure(String),
}

struct ServerState {
    version: u64,
    committed: Config,
    transactions: HashMap<String, TxState>,
    next_tx: u64,
    next_object_id: u64,
}

struct TxState {
    version: u64,
    status: TransactionStatus,
    staged: Config,
    /// Set once a commit was refused; the transaction is then read-only.
    commit_refused: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_service_root(DEFAULT_SERVICE_ROOT)
    }

    /// Serve requests under a non-default service root.
    pub fn with_service_root(service_root: &str) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                root: service_root
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                state: Mutex::new(ServerState {
                    version: 1,
                    committed: Config::new(),
                    transactions: HashMap::new(),
                    next_tx: 1,
                    next_object_id: 1,
                }),
                scripted: Mutex::new(VecDeque::new()),
                log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Serve `status` + `body` for the next request instead of the server logic.
    pub fn push_response(&self, status: u16, body: impl Into<Bytes>) {
        self.inner
            .scripted
            .lock()
            .push_back(Scripted::Response(RawResponse::new(status, body)));
    }

    /// Fail the next request as a network failure would.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.inner.scripted.lock().push_back(Scripted::Failure(message.into()));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.inner.log.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.log.lock().len()
    }

    /// Current committed version.
    pub fn version(&self) -> Version {
        Version(self.inner.state.lock().version)
    }

    /// Names in a committed top-level collection, e.g. `"backends"`.
    pub fn committed_names(&self, collection: &str) -> Vec<String> {
        self.committed_keys(&CollectionKey::top_level(collection))
    }

    /// Names in a committed child collection, e.g. the `"servers"` of
    /// backend `"web"`.
    pub fn committed_child_names(&self, parent_collection: &str, parent: &str, collection: &str) -> Vec<String> {
        self.committed_keys(&CollectionKey::nested(parent_collection, parent, collection))
    }

    fn committed_keys(&self, key: &CollectionKey) -> Vec<String> {
        self.inner
            .state
            .lock()
            .committed
            .get(key)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Routing
    // ========================================================================

    fn handle(&self, request: &Request) -> RawResponse {
        let Some((segments, query)) = parse_url(&request.url) else {
            return error(400, "malformed request URL");
        };
        let Some(route) = self.strip_root(&segments) else {
            return error(404, "no such endpoint");
        };
        let body = request.body.as_deref().unwrap_or_default();
        let mut state = self.inner.state.lock();

        match (request.method, route.as_slice()) {
            (Method::Get, ["configuration", "version"]) => {
                RawResponse::new(200, format!("{}\n", state.version))
            }
            (Method::Post, ["transactions"]) => state.create_transaction(query.get(VERSION_PARAM)),
            (Method::Get, ["transactions", id]) => match state.transactions.get(*id) {
                Some(tx) => json_response(200, &tx.describe(id)),
                None => error(404, format!("transaction {id} not found")),
            },
            (Method::Put, ["transactions", id]) => state.commit(id),
            (Method::Delete, ["transactions", id]) => match state.transactions.remove(*id) {
                Some(_) => RawResponse::new(204, Bytes::new()),
                None => error(404, format!("transaction {id} not found")),
            },
            (method, ["configuration", rest @ ..]) => {
                let Some(target) = Target::parse(rest) else {
                    return error(404, "no such endpoint");
                };
                state.resource(method, target, query.get(TRANSACTION_ID_PARAM), body)
            }
            _ => error(404, "no such endpoint"),
        }
    }

    /// Path segments after the service root.
    fn strip_root<'a>(&self, segments: &'a [String]) -> Option<Vec<&'a str>> {
        let root = &self.inner.root;
        let start = (0..=segments.len().checked_sub(root.len())?)
            .find(|&i| segments[i..i + root.len()] == root[..])?;
        Some(segments[start + root.len()..].iter().map(String::as_str).collect())
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryTransport")
            .field("version", &state.version)
            .field("open_transactions", &state.transactions.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: Request) -> Result<RawResponse> {
        self.inner.log.lock().push(request.clone());
        let scripted = self.inner.scripted.lock().pop_front();
        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(message)) => Err(Error::Internal(message)),
            None => Ok(self.handle(&request)),
        }
    }
}

// ============================================================================
// Transactions
// ============================================================================

impl TxState {
    fn describe(&self, id: &str) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            status: self.status,
            version: Some(Version(self.version)),
        }
    }
}

impl ServerState {
    fn create_transaction(&mut self, version: Option<&String>) -> RawResponse {
        let Some(version) = version.and_then(|v| v.parse::<u64>().ok()) else {
            return error(400, "version query parameter is required");
        };
        if version > self.version {
            return error(404, format!("version {version} not found"));
        }
        let id = format!("tx-{:04}", self.next_tx);
        self.next_tx += 1;
        let tx = TxState {
            version,
            status: TransactionStatus::InProgress,
            staged: self.committed.clone(),
            commit_refused: false,
        };
        let response = json_response(201, &tx.describe(&id));
        self.transactions.insert(id, tx);
        response
    }

    fn commit(&mut self, id: &str) -> RawResponse {
        let current = self.version;
        let Some(tx) = self.transactions.get_mut(id) else {
            return error(404, format!("transaction {id} not found"));
        };
        if tx.status != TransactionStatus::InProgress {
            tx.commit_refused = true;
            tx.staged = Config::new();
            return error(406, format!("transaction {id} is {}", tx.status));
        }
        if tx.version != current {
            tx.status = TransactionStatus::Outdated;
            tx.commit_refused = true;
            tx.staged = Config::new();
            return error(
                406,
                format!("transaction {id} is outdated: opened at version {}, current version {current}", tx.version),
            );
        }

        tx.status = TransactionStatus::Success;
        self.committed = std::mem::take(&mut tx.staged);
        let described = tx.describe(id);
        self.version += 1;
        for (other, open) in self.transactions.iter_mut() {
            if other != id && open.status == TransactionStatus::InProgress {
                open.status = TransactionStatus::Outdated;
            }
        }
        json_response(200, &described)
    }

    // ========================================================================
    // Resources
    // ========================================================================

    fn resource(
        &mut self,
        method: Method,
        target: Target<'_>,
        transaction_id: Option<&String>,
        body: &[u8],
    ) -> RawResponse {
        let Some(tx_id) = transaction_id.filter(|id| !id.is_empty()) else {
            return error(400, "transaction_id is required");
        };
        let Some(tx) = self.transactions.get_mut(tx_id.as_str()) else {
            return error(404, format!("transaction {tx_id} not found"));
        };
        // An outdated transaction still accepts edits; its commit fails.
        if tx.commit_refused || matches!(tx.status, TransactionStatus::Success | TransactionStatus::Failed) {
            return error(406, format!("transaction {tx_id} is {}", tx.status));
        }
        if let Some((parent_collection, parent)) = target.parent {
            let parent_exists = tx
                .staged
                .get(&CollectionKey::top_level(parent_collection))
                .is_some_and(|items| items.contains_key(parent));
            if !parent_exists {
                return error(404, format!("{parent_collection}/{parent} not found"));
            }
        }

        let key = target.collection_key();
        match (method, target.name) {
            (Method::Get, None) => {
                let items: Vec<&Json> = tx.staged.get(&key).map(|m| m.values().collect()).unwrap_or_default();
                json_response(200, &items)
            }
            (Method::Post, None) => {
                let mut object = match parse_object(body) {
                    Ok(object) => object,
                    Err(response) => return response,
                };
                let Some(name) = object.get("name").and_then(Json::as_str).map(str::to_string) else {
                    return error(400, "name is required");
                };
                let items = tx.staged.entry(key).or_default();
                if items.contains_key(&name) {
                    return error(409, format!("{} {name} already exists", target.collection));
                }
                if !object.contains_key("id") {
                    let id = self.next_object_id;
                    self.next_object_id += 1;
                    let id = if target.parent.is_some() { Json::from(id.to_string()) } else { Json::from(id) };
                    object.insert("id".into(), id);
                }
                let object = Json::Object(object);
                items.insert(name, object.clone());
                json_response(201, &object)
            }
            (Method::Get, Some(name)) => match tx.staged.get(&key).and_then(|m| m.get(name)) {
                Some(object) => json_response(200, object),
                None => error(404, format!("{} {name} not found", target.collection)),
            },
            (Method::Put, Some(name)) => {
                let mut object = match parse_object(body) {
                    Ok(object) => object,
                    Err(response) => return response,
                };
                if object.get("name").and_then(Json::as_str) != Some(name) {
                    return error(400, format!("body name does not match {name}"));
                }
                let Some(existing) = tx.staged.get_mut(&key).and_then(|m| m.get_mut(name)) else {
                    return error(404, format!("{} {name} not found", target.collection));
                };
                if let Some(id) = existing.get("id").filter(|_| !object.contains_key("id")) {
                    object.insert("id".into(), id.clone());
                }
                *existing = Json::Object(object);
                json_response(200, &*existing)
            }
            (Method::Delete, Some(name)) => {
                let removed = tx.staged.get_mut(&key).and_then(|m| m.remove(name));
                if removed.is_none() {
                    return error(404, format!("{} {name} not found", target.collection));
                }
                if target.parent.is_none() {
                    tx.staged.retain(|child, _| !child.is_child_of(target.collection, name));
                }
                RawResponse::new(204, Bytes::new())
            }
            _ => error(405, "method not allowed"),
        }
    }
}

/// Resource path below `configuration/`.
struct Target<'a> {
    parent: Option<(&'a str, &'a str)>,
    collection: &'a str,
    name: Option<&'a str>,
}

impl<'a> Target<'a> {
    fn parse(rest: &[&'a str]) -> Option<Self> {
        let (parent, collection, name) = match *rest {
            [collection] => (None, collection, None),
            [collection, name] => (None, collection, Some(name)),
            [p, parent, collection] => (Some((p, parent)), collection, None),
            [p, parent, collection, name] => (Some((p, parent)), collection, Some(name)),
            _ => return None,
        };
        let known = match parent {
            None => TOP_LEVEL.contains(&collection),
            Some((p, _)) => NESTED.contains(&(p, collection)),
        };
        known.then_some(Self { parent, collection, name })
    }

    fn collection_key(&self) -> CollectionKey {
        match self.parent {
            Some((p, parent)) => CollectionKey::nested(p, parent, self.collection),
            None => CollectionKey::top_level(self.collection),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Split a URL into decoded path segments and query parameters.
fn parse_url(raw: &str) -> Option<(Vec<String>, HashMap<String, String>)> {
    let url = Url::parse(raw).ok()?;
    let segments = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8().ok().map(|s| s.into_owned()))
        .collect::<Option<Vec<_>>>()?;
    let params = url.query_pairs().into_owned().collect();
    Some((segments, params))
}

fn parse_object(body: &[u8]) -> std::result::Result<Map<String, Json>, RawResponse> {
    match serde_json::from_slice::<Json>(body) {
        Ok(Json::Object(object)) => Ok(object),
        Ok(_) => Err(error(400, "request body must be a JSON object")),
        Err(e) => Err(error(400, format!("invalid JSON body: {e}"))),
    }
}

fn json_response<S: Serialize + ?Sized>(status: u16, value: &S) -> RawResponse {
    match serde_json::to_vec(value) {
        Ok(body) => RawResponse::new(status, body),
        Err(e) => error(500, format!("encoding response: {e}")),
    }
}

fn error(status: u16, message: impl Into<String>) -> RawResponse {
    let body = json!({ "code": status, "message": message.into() });
    RawResponse::new(status, body.to_string())
}
