//! # Resource CRUD Facade
//!
//! One generic get/list/add/replace/delete implementation shared by every
//! resource kind. A kind plugs in by implementing [`Resource`] (its
//! collection path segment and name accessor) and, when it lives under a
//! parent, [`NestedResource`].
//!
//! Every operation takes the transaction id explicitly. An empty id, name
//! or parent name is a caller error and is reported as
//! [`Error::BadRequest`] before any request is sent. The facade never
//! opens or closes transactions.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::endpoint::TRANSACTION_ID_PARAM;
use crate::model::{Backend, Bind, Frontend, Server};
use crate::transport::{Method, Transport};
use crate::tx::{TransactionId, decode_optional};
use crate::{Client, Error, Result};

// ============================================================================
// Capability traits
// ============================================================================

/// A name-keyed configuration object with a JSON wire shape.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync {
    /// Plural path segment of the collection, e.g. `"backends"`.
    const COLLECTION: &'static str;

    /// Name identifying the resource within its parent scope.
    fn name(&self) -> Option<&str>;
}

/// A resource addressed directly under the configuration root.
pub trait TopLevelResource: Resource {}

/// A resource scoped to a named parent resource.
pub trait NestedResource: Resource {
    /// Collection segment of the parent kind, e.g. `"frontends"`.
    const PARENT_COLLECTION: &'static str;
}

impl Resource for Backend {
    const COLLECTION: &'static str = "backends";
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Resource for Frontend {
    const COLLECTION: &'static str = "frontends";
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl TopLevelResource for Backend {}
impl TopLevelResource for Frontend {}

impl Resource for Bind {
    const COLLECTION: &'static str = "binds";
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl NestedResource for Bind {
    const PARENT_COLLECTION: &'static str = "frontends";
}

impl Resource for Server {
    const COLLECTION: &'static str = "servers";
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl NestedResource for Server {
    const PARENT_COLLECTION: &'static str = "backends";
}

// ============================================================================
// Facade
// ============================================================================

/// CRUD access to one resource collection.
///
/// Obtained from [`Client::resources`], [`Client::nested`] or the
/// per-kind shorthands ([`Client::backends`], [`Client::binds`], ...).
pub struct Resources<'c, T: Transport, R: Resource> {
    client: &'c Client<T>,
    /// `(parent collection, parent name)` for nested kinds.
    parent: Option<(&'static str, String)>,
    _kind: PhantomData<fn() -> R>,
}

impl<'c, T: Transport, R: TopLevelResource> Resources<'c, T, R> {
    pub(crate) fn top_level(client: &'c Client<T>) -> Self {
        Self { client, parent: None, _kind: PhantomData }
    }
}

impl<'c, T: Transport, R: NestedResource> Resources<'c, T, R> {
    pub(crate) fn nested(client: &'c Client<T>, parent: impl Into<String>) -> Self {
        Self {
            client,
            parent: Some((R::PARENT_COLLECTION, parent.into())),
            _kind: PhantomData,
        }
    }
}

impl<'c, T: Transport, R: Resource> Resources<'c, T, R> {
    /// Parent name of a nested collection.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_ref().map(|(_, name)| name.as_str())
    }

    /// Create `resource` in the transaction; returns the server's view of it.
    pub async fn add(&self, transaction_id: &TransactionId, resource: &R) -> Result<Option<R>> {
        let url = self.collection_url(transaction_id)?;
        let body = encode(resource)?;
        trace!(collection = R::COLLECTION, name = ?resource.name(), "add");
        let response = self.client.call(Method::Post, url, Some(body)).await?;
        decode_optional(&response)
    }

    /// Fetch one resource by name. A missing resource is [`Error::NotFound`].
    pub async fn get(&self, name: &str, transaction_id: &TransactionId) -> Result<Option<R>> {
        let url = self.item_url(name, transaction_id)?;
        let response = self.client.call(Method::Get, url, None).await?;
        decode_optional(&response)
    }

    /// List the collection. An empty body is an empty list.
    pub async fn list(&self, transaction_id: &TransactionId) -> Result<Vec<R>> {
        let url = self.collection_url(transaction_id)?;
        let response = self.client.call(Method::Get, url, None).await?;
        Ok(decode_optional(&response)?.unwrap_or_default())
    }

    /// Replace the resource named by `resource.name()` wholesale.
    ///
    /// Fields left unset are reset to their server defaults.
    pub async fn replace(&self, transaction_id: &TransactionId, resource: &R) -> Result<Option<R>> {
        transaction_id.require()?;
        let name = resource
            .name()
            .ok_or_else(|| Error::BadRequest("resource name is required for replace".into()))?;
        let url = self.item_url(name, transaction_id)?;
        let body = encode(resource)?;
        trace!(collection = R::COLLECTION, name, "replace");
        let response = self.client.call(Method::Put, url, Some(body)).await?;
        decode_optional(&response)
    }

    /// Delete by name. Deleting a missing resource is [`Error::NotFound`].
    pub async fn delete(&self, name: &str, transaction_id: &TransactionId) -> Result<()> {
        let url = self.item_url(name, transaction_id)?;
        trace!(collection = R::COLLECTION, name, "delete");
        self.client.call(Method::Delete, url, None).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // URL construction. All precondition checks live here.
    // ------------------------------------------------------------------------

    fn parent_scope(&self) -> Result<Option<(&'static str, &str)>> {
        match &self.parent {
            Some((_, name)) if name.is_empty() => Err(Error::BadRequest("parent name is required".into())),
            Some((collection, name)) => Ok(Some((*collection, name.as_str()))),
            None => Ok(None),
        }
    }

    fn collection_url(&self, transaction_id: &TransactionId) -> Result<String> {
        let id = transaction_id.require()?;
        let parent = self.parent_scope()?;
        Ok(self
            .client
            .endpoints()
            .collection(R::COLLECTION, parent)
            .query(TRANSACTION_ID_PARAM, id)
            .build())
    }

    fn item_url(&self, name: &str, transaction_id: &TransactionId) -> Result<String> {
        let id = transaction_id.require()?;
        if name.is_empty() {
            return Err(Error::BadRequest("resource name is required".into()));
        }
        let parent = self.parent_scope()?;
        Ok(self
            .client
            .endpoints()
            .item(R::COLLECTION, parent, name)
            .query(TRANSACTION_ID_PARAM, id)
            .build())
    }
}

fn encode<R: Serialize>(resource: &R) -> Result<bytes::Bytes> {
    serde_json::to_vec(resource)
        .map(bytes::Bytes::from)
        .map_err(|e| Error::Internal(format!("encoding request body: {e}")))
}

// ============================================================================
// Client accessors
// ============================================================================

impl<T: Transport> Client<T> {
    /// Facade over a top-level resource kind.
    pub fn resources<R: TopLevelResource>(&self) -> Resources<'_, T, R> {
        Resources::top_level(self)
    }

    /// Facade over a nested resource kind under the named parent.
    pub fn nested<R: NestedResource>(&self, parent: impl Into<String>) -> Resources<'_, T, R> {
        Resources::nested(self, parent)
    }

    pub fn backends(&self) -> Resources<'_, T, Backend> {
        self.resources()
    }

    pub fn frontends(&self) -> Resources<'_, T, Frontend> {
        self.resources()
    }

    /// Binds of `frontend`.
    pub fn binds(&self, frontend: impl Into<String>) -> Resources<'_, T, Bind> {
        self.nested(frontend)
    }

    /// Servers of `backend`.
    pub fn servers(&self, backend: impl Into<String>) -> Resources<'_, T, Server> {
        self.nested(backend)
    }
}
