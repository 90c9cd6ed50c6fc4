//! Durable store (C3): namespaced key/value persistence with async fronting.
//!
//! Grounded on `mofa-kernel::storage::Storage<K, V>` (generic async
//! load/save/delete/list contract), generalized to the spec's composite
//! `(namespace, key)` addressing and `serde_json::Value` payloads.

mod embedded;
#[cfg(feature = "persistence-postgres")]
mod relational;

pub use embedded::EmbeddedStore;
#[cfg(feature = "persistence-postgres")]
pub use relational::RelationalStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A composite namespace, e.g. `("memory", user_id)` (spec §3 "Store Record").
pub type Namespace = Vec<String>;

/// Errors from the durable store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Namespaced async key/value contract.
///
/// Concurrent access is serialised per namespace by the backend; callers
/// simply `.await` the returned futures (spec §4.3).
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, ns: &Namespace, key: &str) -> StoreResult<Option<Value>>;
    async fn put(&self, ns: &Namespace, key: &str, value: Value) -> StoreResult<()>;
    async fn list(&self, ns: &Namespace) -> StoreResult<Vec<(String, Value)>>;
    async fn delete(&self, ns: &Namespace, key: &str) -> StoreResult<bool>;
}
