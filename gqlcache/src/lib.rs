#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Single-flight deduplication of upstream calls.
///
/// [`RequestCoalescer`](coalescer::RequestCoalescer) makes concurrent callers
/// for the same key share one upstream call, for foreground misses and
/// background refreshes alike.
pub mod coalescer;

/// Errors returned to callers: network, upstream HTTP and GraphQL errors.
pub mod error;

/// Upstream calls and response classification.
pub mod executor;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Hits, misses, stale responses and bypasses
/// - Coalesced callers and upstream latency
/// - Background refresh outcomes and store failures
pub mod metrics;

/// Deployment configuration: strategy presets and key options.
pub mod config;

/// Background task offloading for stale-while-revalidate.
pub mod offload;

/// The read-through cache.
pub mod orchestrator;

pub use coalescer::{Joined, RequestCoalescer};
pub use config::{Config, ConfigError, KeyConfig, PresetConfig, PresetsConfig};
pub use error::{CacheError, GraphQLError};
pub use executor::{FetchExecutor, Fetched};
pub use offload::OffloadManager;
pub use orchestrator::{CacheOrchestrator, CacheOrchestratorBuilder, CacheResponse, NotSet};

pub use gqlcache_core::{
    CacheEntry, CacheKey, CacheKeyBuilder, CachePolicy, CacheScope, CacheStatus, CachingStrategy,
    Freshness, GraphQLRequest, KeyPart, Offload, OperationKind, Raw, StrategyPresets, Transport,
    TransportError, TransportResponse, classify, generate_cache_control_header,
};

/// Store traits and errors.
pub mod backend {
    pub use gqlcache_backend::*;
}
