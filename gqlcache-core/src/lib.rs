#![warn(missing_docs)]
//! # gqlcache-core
//!
//! Core types for the gqlcache GraphQL response cache.
//!
//! This crate holds the pure, runtime-agnostic pieces the cache is built
//! from. Storage adapters (`gqlcache-backend`, `gqlcache-moka`) and the
//! orchestrating crate (`gqlcache`) depend on it.
//!
//! - **Identify** requests ([`CacheKey`], [`CacheKeyBuilder`])
//! - **Describe** freshness policy ([`CachingStrategy`], [`generate_cache_control_header`])
//! - **Classify** stored entries ([`CacheEntry`], [`classify`])
//! - **Call** the upstream endpoint ([`Transport`])
//! - **Defer** background work past the response ([`Offload`])

pub mod entry;
pub mod key;
pub mod key_builder;
pub mod offload;
pub mod request;
pub mod status;
pub mod strategy;
pub mod transport;

pub use entry::{CacheEntry, Freshness, classify};
pub use key::{CacheKey, KeyPart};
pub use key_builder::CacheKeyBuilder;
pub use offload::Offload;
pub use request::{GraphQLRequest, GraphQLRequestBuilder, OperationKind};
pub use status::CacheStatus;
pub use strategy::{
    CachePolicy, CacheScope, CachingStrategy, StrategyPresets, generate_cache_control_header,
};
pub use transport::{Transport, TransportError, TransportResponse};

#[doc(hidden)]
pub use smol_str::SmolStr;

/// Raw byte data type used for serialized cache entries.
pub type Raw = bytes::Bytes;
