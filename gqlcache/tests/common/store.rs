use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use gqlcache::backend::{Backend, BackendResult, DeleteStatus, StoreError};
use gqlcache::{CacheEntry, CacheKey, Raw};

/// In-memory store with counters and switchable failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    data: DashMap<CacheKey, (Raw, Option<Duration>)>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read and write fails.
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.fail_reads(true);
        store.fail_writes(true);
        store
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn ttl_of(&self, key: &CacheKey) -> Option<Duration> {
        self.inner.data.get(key).and_then(|entry| entry.1)
    }

    /// Seeds an entry without touching the counters.
    pub fn seed(&self, key: &CacheKey, entry: &CacheEntry) {
        let raw = self.value_format().serialize(entry).unwrap();
        self.inner.data.insert(key.clone(), (raw, None));
    }

    /// Reads an entry without touching the counters.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        let raw = self.inner.data.get(key).map(|entry| entry.0.clone())?;
        Some(self.value_format().deserialize(&raw).unwrap())
    }
}

fn outage() -> StoreError {
    StoreError::Connection(Box::new(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        "store unavailable",
    )))
}

#[async_trait]
impl Backend for MemoryStore {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<Raw>> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(self.inner.data.get(key).map(|entry| entry.0.clone()))
    }

    async fn write(&self, key: &CacheKey, value: Raw, ttl: Option<Duration>) -> BackendResult<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inner.data.insert(key.clone(), (value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        match self.inner.data.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
