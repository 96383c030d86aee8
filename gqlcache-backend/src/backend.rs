use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use gqlcache_core::{CacheEntry, CacheKey, Raw};
use tracing::trace;

use crate::{
    DeleteStatus, StoreError,
    format::{Format, JsonFormat},
};

pub type BackendResult<T> = Result<T, StoreError>;

/// Raw key/value store.
///
/// `ttl` passed to [`write`](Backend::write) is a hint: past it the entry is
/// of no use to the cache, so the store may evict it. Stores without
/// expiration support may ignore it.
#[async_trait]
pub trait Backend: Sync + Send {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>>;

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()>;

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus>;

    /// Returns the name of this backend for logs and metrics labels.
    fn name(&self) -> &str {
        "backend"
    }

    fn value_format(&self) -> &dyn Format {
        &JsonFormat
    }
}

#[async_trait]
impl Backend for &dyn Backend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>> {
        (*self).read(key).await
    }

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()> {
        (*self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        (*self).remove(key).await
    }

    fn name(&self) -> &str {
        (*self).name()
    }

    fn value_format(&self) -> &dyn Format {
        (*self).value_format()
    }
}

#[async_trait]
impl Backend for Box<dyn Backend> {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        (**self).remove(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn value_format(&self) -> &dyn Format {
        (**self).value_format()
    }
}

#[async_trait]
impl<B> Backend for Arc<B>
where
    B: Backend + ?Sized,
{
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        (**self).remove(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn value_format(&self) -> &dyn Format {
        (**self).value_format()
    }
}

/// Typed store operations on top of [`Backend`].
///
/// Handles entry serialization with the backend's [`Format`]. Implemented
/// for every backend.
pub trait CacheStore: Backend {
    /// Reads and decodes the entry stored under `key`.
    fn get(
        &self,
        key: &CacheKey,
    ) -> impl Future<Output = BackendResult<Option<CacheEntry>>> + Send {
        async move {
            match self.read(key).await? {
                Some(raw) => {
                    let entry = self.value_format().deserialize(&raw)?;
                    trace!(backend = self.name(), bytes = raw.len(), "entry read");
                    Ok(Some(entry))
                }
                None => Ok(None),
            }
        }
    }

    /// Encodes and writes `entry` under `key`.
    fn put(
        &self,
        key: &CacheKey,
        entry: &CacheEntry,
        ttl: Option<Duration>,
    ) -> impl Future<Output = BackendResult<()>> + Send {
        async move {
            let raw = self.value_format().serialize(entry)?;
            trace!(backend = self.name(), bytes = raw.len(), "entry write");
            self.write(key, raw, ttl).await
        }
    }

    /// Removes the entry stored under `key`.
    fn delete(&self, key: &CacheKey) -> impl Future<Output = BackendResult<DeleteStatus>> + Send {
        async move { self.remove(key).await }
    }
}

impl<B> CacheStore for B where B: Backend + ?Sized {}
