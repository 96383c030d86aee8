//! The cache front door.
//!
//! [`CacheOrchestrator::fetch`] combines key building, store lookup,
//! freshness classification, coalescing and background refresh:
//!
//! ```text
//!                 ┌──────────────┐
//!   request ────▶ │  build key   │
//!                 └──────┬───────┘
//!        none / mutation │ otherwise
//!      ┌─────────────────┴─────────┐
//!      ▼                           ▼
//!  direct fetch               store.get ──error──▶ direct fetch (Miss)
//!  (Bypass)                        │
//!                   ┌──────────────┼──────────────┐
//!                 Fresh          Stale          Absent
//!                   │              │              │
//!                  Hit     serve + refresh   coalesced fetch
//!                           in background      + write (Miss)
//! ```
//!
//! Fetches that write to the store and direct fetches that never do are
//! coalesced separately, so a caller that expects a write never waits on a
//! flight that skips it.
//!
//! Store failures are logged and never reach the caller. Upstream failures
//! are returned unchanged to every coalesced caller and nothing is written.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use gqlcache_backend::{Backend, CacheStore, DeleteStatus};
use gqlcache_core::{
    CacheEntry, CacheKey, CacheKeyBuilder, CacheStatus, CachingStrategy, Freshness,
    GraphQLRequest, Offload, StrategyPresets, Transport,
};
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, warn};

use crate::coalescer::RequestCoalescer;
use crate::config::Config;
use crate::error::CacheError;
use crate::executor::{FetchExecutor, Fetched};
use crate::metrics;
use crate::offload::OffloadManager;

/// Payload handed back to the caller, with how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResponse {
    /// The `data` member of the upstream response.
    pub data: Value,
    /// Where the payload came from.
    pub status: CacheStatus,
}

impl CacheResponse {
    fn new(data: Value, status: CacheStatus) -> Self {
        Self { data, status }
    }
}

/// Read-through GraphQL response cache.
///
/// Cheap to clone; clones share the store, transport and in-flight registry.
///
/// ```ignore
/// let cache = CacheOrchestrator::builder()
///     .store(MokaBackend::builder().max_entries(10_000).build())
///     .transport(ReqwestTransport::new())
///     .build();
///
/// let response = cache.fetch(&request, CachingStrategy::Short).await?;
/// ```
pub struct CacheOrchestrator<S, T, O = OffloadManager> {
    store: Arc<S>,
    executor: Arc<FetchExecutor<T>>,
    offload: O,
    coalescer: RequestCoalescer<Fetched>,
    direct: RequestCoalescer<Fetched>,
    keys: CacheKeyBuilder,
    presets: StrategyPresets,
}

impl<S, T, O> Clone for CacheOrchestrator<S, T, O>
where
    O: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            executor: Arc::clone(&self.executor),
            offload: self.offload.clone(),
            coalescer: self.coalescer.clone(),
            direct: self.direct.clone(),
            keys: self.keys.clone(),
            presets: self.presets,
        }
    }
}

impl<S, T, O> std::fmt::Debug for CacheOrchestrator<S, T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("coalescer", &self.coalescer)
            .field("direct", &self.direct)
            .field("keys", &self.keys)
            .field("presets", &self.presets)
            .finish_non_exhaustive()
    }
}

impl CacheOrchestrator<NotSet, NotSet, OffloadManager> {
    /// Creates a new [`CacheOrchestratorBuilder`].
    pub fn builder() -> CacheOrchestratorBuilder<NotSet, NotSet, OffloadManager> {
        CacheOrchestratorBuilder::new()
    }
}

impl<S, T, O> CacheOrchestrator<S, T, O>
where
    S: Backend + 'static,
    T: Transport + 'static,
    O: Offload,
{
    /// Returns the response for `request` under `strategy`.
    ///
    /// Fails only with upstream errors.
    pub async fn fetch(
        &self,
        request: &GraphQLRequest,
        strategy: CachingStrategy,
    ) -> Result<CacheResponse, CacheError> {
        let key = self.keys.build_request(request);
        let span = debug_span!(
            "gqlcache.fetch",
            cache.key = %key,
            cache.strategy = ?strategy,
            cache.status = tracing::field::Empty,
        );

        let result = self
            .fetch_inner(key, request, strategy)
            .instrument(span.clone())
            .await;
        if let Ok(response) = &result {
            span.record("cache.status", response.status.as_str());
            metrics::record_status(response.status, self.store.name());
        }
        result
    }

    async fn fetch_inner(
        &self,
        key: CacheKey,
        request: &GraphQLRequest,
        strategy: CachingStrategy,
    ) -> Result<CacheResponse, CacheError> {
        let policy = match self.presets.resolve(&strategy) {
            Some(policy) if !request.is_mutation() => policy,
            _ => {
                debug!(mutation = request.is_mutation(), "bypassing store");
                let fetched = self
                    .direct
                    .run(&key, || self.upstream(&key, request, strategy, None))
                    .await?;
                return Ok(CacheResponse::new(fetched.payload, CacheStatus::Bypass));
            }
        };
        let ttl = Some(policy.ttl());

        let entry = match self.store.get(&key).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(backend = self.store.name(), %error, "store read failed, fetching directly");
                metrics::record_store_error(self.store.name(), "read");
                let fetched = self
                    .direct
                    .run(&key, || self.upstream(&key, request, strategy, None))
                    .await?;
                return Ok(CacheResponse::new(fetched.payload, CacheStatus::Miss));
            }
        };

        let freshness = self.presets.classify(entry.as_ref(), &strategy, Utc::now());
        match (freshness, entry) {
            (Freshness::Fresh, Some(entry)) => {
                debug!("fresh hit");
                Ok(CacheResponse::new(entry.into_value(), CacheStatus::Hit))
            }
            (Freshness::Stale, Some(entry)) => {
                let joined = self
                    .coalescer
                    .join(&key, || self.upstream(&key, request, strategy, ttl));
                if joined.is_leader() {
                    debug!("stale hit, scheduling refresh");
                    self.offload.spawn("revalidate", async move {
                        match joined.await {
                            Ok(_) => {
                                debug!("refresh completed");
                                metrics::record_revalidation(true);
                            }
                            Err(error) => {
                                warn!(%error, "refresh failed, keeping stale entry");
                                metrics::record_revalidation(false);
                            }
                        }
                    }
                    .in_current_span());
                } else {
                    debug!("stale hit, refresh already in flight");
                }
                Ok(CacheResponse::new(entry.into_value(), CacheStatus::Stale))
            }
            _ => {
                debug!("miss");
                let fetched = self
                    .coalescer
                    .run(&key, || self.upstream(&key, request, strategy, ttl))
                    .await?;
                Ok(CacheResponse::new(fetched.payload, CacheStatus::Miss))
            }
        }
    }

    /// Builds the upstream call for `key`.
    ///
    /// With a `ttl`, a cacheable success is written to the store before the
    /// flight settles, so every upstream call writes at most once.
    fn upstream(
        &self,
        key: &CacheKey,
        request: &GraphQLRequest,
        strategy: CachingStrategy,
        ttl: Option<Duration>,
    ) -> BoxFuture<'static, Result<Fetched, CacheError>> {
        let store = Arc::clone(&self.store);
        let executor = Arc::clone(&self.executor);
        let key = key.clone();
        let request = request.clone();

        async move {
            let fetched = executor.fetch(&request, &strategy).await?;
            if let Some(ttl) = ttl
                && fetched.cacheable
            {
                let entry = CacheEntry::now(fetched.payload.clone(), strategy);
                if let Err(error) = store.put(&key, &entry, Some(ttl)).await {
                    warn!(backend = store.name(), %error, "store write failed");
                    metrics::record_store_error(store.name(), "write");
                }
            }
            Ok(fetched)
        }
        .boxed()
    }

    /// Removes the stored entry for `request`.
    ///
    /// Returns whether an entry was removed. Store failures are logged and
    /// reported as `false`.
    pub async fn invalidate(&self, request: &GraphQLRequest) -> bool {
        let key = self.keys.build_request(request);
        match self.store.delete(&key).await {
            Ok(DeleteStatus::Deleted(_)) => {
                debug!(key = %key, "entry invalidated");
                true
            }
            Ok(DeleteStatus::Missing) => false,
            Err(error) => {
                warn!(backend = self.store.name(), key = %key, %error, "store remove failed");
                metrics::record_store_error(self.store.name(), "remove");
                false
            }
        }
    }
}

impl<S, T, O> CacheOrchestrator<S, T, O> {
    /// `Cache-Control` value for responses served under `strategy`.
    pub fn cache_control_header(&self, strategy: &CachingStrategy) -> String {
        self.presets.cache_control_header(strategy)
    }

    /// Key the cache uses for `request`.
    pub fn key_for(&self, request: &GraphQLRequest) -> CacheKey {
        self.keys.build_request(request)
    }

    /// Presets the cache resolves strategies against.
    pub fn presets(&self) -> &StrategyPresets {
        &self.presets
    }

    /// The in-flight registry of fetches that write to the store.
    pub fn coalescer(&self) -> &RequestCoalescer<Fetched> {
        &self.coalescer
    }

    /// The in-flight registry of direct fetches: bypassed strategies,
    /// mutations and reads the store failed to answer.
    pub fn direct_coalescer(&self) -> &RequestCoalescer<Fetched> {
        &self.direct
    }

    /// The background-task hook.
    pub fn offload(&self) -> &O {
        &self.offload
    }

    /// The store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, it means you haven't called
/// the corresponding builder method yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotSet;

/// Builder for [`CacheOrchestrator`].
///
/// Use [`CacheOrchestrator::builder()`] to create a new builder. Store and
/// transport are required; the offload hook defaults to [`OffloadManager`]
/// and the configuration to [`Config::default`].
pub struct CacheOrchestratorBuilder<S, T, O> {
    store: S,
    transport: T,
    offload: O,
    config: Config,
}

impl CacheOrchestratorBuilder<NotSet, NotSet, OffloadManager> {
    /// Creates a new builder with no store and no transport.
    pub fn new() -> Self {
        Self {
            store: NotSet,
            transport: NotSet,
            offload: OffloadManager::default(),
            config: Config::default(),
        }
    }
}

impl Default for CacheOrchestratorBuilder<NotSet, NotSet, OffloadManager> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T, O> CacheOrchestratorBuilder<S, T, O> {
    /// Sets the store.
    pub fn store<NewS>(self, store: NewS) -> CacheOrchestratorBuilder<NewS, T, O> {
        CacheOrchestratorBuilder {
            store,
            transport: self.transport,
            offload: self.offload,
            config: self.config,
        }
    }

    /// Sets the upstream transport.
    pub fn transport<NewT>(self, transport: NewT) -> CacheOrchestratorBuilder<S, NewT, O> {
        CacheOrchestratorBuilder {
            store: self.store,
            transport,
            offload: self.offload,
            config: self.config,
        }
    }

    /// Sets the background-task hook.
    pub fn offload<NewO>(self, offload: NewO) -> CacheOrchestratorBuilder<S, T, NewO> {
        CacheOrchestratorBuilder {
            store: self.store,
            transport: self.transport,
            offload,
            config: self.config,
        }
    }

    /// Sets presets and key options.
    pub fn config(self, config: Config) -> Self {
        Self { config, ..self }
    }
}

impl<S, T, O> CacheOrchestratorBuilder<S, T, O>
where
    S: Backend + 'static,
    T: Transport + 'static,
    O: Offload,
{
    /// Builds the [`CacheOrchestrator`].
    pub fn build(self) -> CacheOrchestrator<S, T, O> {
        CacheOrchestrator {
            store: Arc::new(self.store),
            executor: Arc::new(FetchExecutor::new(self.transport)),
            offload: self.offload,
            coalescer: RequestCoalescer::new(),
            direct: RequestCoalescer::new(),
            keys: self.config.key_builder(),
            presets: self.config.presets(),
        }
    }
}
