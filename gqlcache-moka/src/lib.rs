#![warn(missing_docs)]
//! In-memory store for gqlcache, backed by [Moka](https://docs.rs/moka).
//!
//! Entries expire on their own once the TTL hint passed by the cache
//! (fresh window plus stale window) has elapsed, so the store never holds
//! entries the classifier would treat as absent for longer than necessary.
//!
//! ```
//! use gqlcache_moka::MokaBackend;
//!
//! let backend = MokaBackend::builder().max_entries(10_000).build();
//! ```

mod backend;
mod builder;

pub use backend::{MokaBackend, StoredValue};
pub use builder::{ByteCapacity, EntryCapacity, MokaBackendBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;
