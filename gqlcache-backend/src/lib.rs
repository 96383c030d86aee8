//! Store traits for the gqlcache GraphQL response cache.
//!
//! The cache treats its key/value store as a black box. To plug in a store,
//! implement [`Backend`]: raw `read` / `write` / `remove` of byte values by
//! [`CacheKey`](gqlcache_core::CacheKey). Every backend automatically gets
//! [`CacheStore`], the typed `get` / `put` of
//! [`CacheEntry`](gqlcache_core::CacheEntry) values that the orchestrator
//! uses.
//!
//! Store failures surface as [`StoreError`]. The orchestrator never lets them
//! reach its callers: a failing store degrades a request to a direct fetch.
mod backend;
pub mod format;

pub use backend::{Backend, BackendResult, CacheStore};
pub use format::{Format, FormatError, JsonFormat};
use thiserror::Error;

/// Store failure.
///
/// Always internal to the cache: intercepted at the orchestrator boundary
/// and turned into an uncached fetch.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// Network interaction error with a remote store.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),
    /// Serializing or deserializing an entry failed.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Status of a removal.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record removed.
    Deleted(u32),
    /// Record already missing.
    Missing,
}
