//! Moka backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use gqlcache_backend::format::{Format, JsonFormat};
use gqlcache_backend::{Backend, BackendResult, DeleteStatus};
use gqlcache_core::{CacheKey, Raw};
use moka::future::Cache;
use smol_str::SmolStr;
use tracing::trace;

/// Bytes held by the cache together with the TTL they were written with.
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// Serialized entry.
    pub data: Raw,
    /// Time to live from the moment of the write.
    pub ttl: Option<Duration>,
}

impl StoredValue {
    /// Returns the estimated memory usage of this value in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.len()
    }
}

/// In-memory store powered by Moka.
///
/// # Caveats
///
/// - Data is **not persisted**, it is lost on process restart
/// - Data is **not shared** across processes
/// - Expiration is best-effort until Moka's housekeeping runs, which is
///   harmless here: the cache classifies entries by their own timestamp
#[derive(Clone)]
pub struct MokaBackend<S = JsonFormat>
where
    S: Format,
{
    pub(crate) cache: Cache<CacheKey, StoredValue>,
    pub(crate) serializer: S,
    pub(crate) label: SmolStr,
}

impl<S> std::fmt::Debug for MokaBackend<S>
where
    S: Format,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaBackend")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .field("serializer", &self.serializer)
            .finish()
    }
}

impl MokaBackend<JsonFormat> {
    /// Creates a new builder. Capacity must be set before building.
    pub fn builder() -> crate::builder::MokaBackendBuilder<crate::builder::NoCapacity, JsonFormat>
    {
        crate::builder::MokaBackendBuilder::new()
    }
}

impl<S> MokaBackend<S>
where
    S: Format,
{
    /// Returns the underlying Moka cache.
    pub fn cache(&self) -> &Cache<CacheKey, StoredValue> {
        &self.cache
    }
}

#[async_trait]
impl<S> Backend for MokaBackend<S>
where
    S: Format,
{
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>> {
        Ok(self.cache.get(key).await.map(|value| value.data))
    }

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()> {
        trace!(backend = %self.label, ?ttl, "moka insert");
        self.cache
            .insert(key.clone(), StoredValue { data: value, ttl })
            .await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        match self.cache.remove(key).await {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }

    fn value_format(&self) -> &dyn Format {
        &self.serializer
    }
}
