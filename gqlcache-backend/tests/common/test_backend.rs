//! Simple in-memory test backend implementation using DashMap.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use gqlcache_backend::{Backend, BackendResult, DeleteStatus};
use gqlcache_core::{CacheKey, Raw};

/// Simple in-memory backend for testing.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct TestBackend {
    store: Arc<DashMap<CacheKey, (Raw, Option<Duration>)>>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the raw bytes stored under `key`.
    pub fn insert_raw(&self, key: &CacheKey, raw: Raw) {
        self.store.insert(key.clone(), (raw, None));
    }

    /// TTL hint recorded by the last write of `key`.
    pub fn ttl_of(&self, key: &CacheKey) -> Option<Duration> {
        self.store.get(key).and_then(|entry| entry.1)
    }
}

#[async_trait]
impl Backend for TestBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>> {
        Ok(self.store.get(key).map(|entry| entry.0.clone()))
    }

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()> {
        self.store.insert(key.clone(), (value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        Ok(match self.store.remove(key) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    fn name(&self) -> &str {
        "test"
    }
}
