//! Background task execution for stale-while-revalidate refreshes.
//!
//! [`OffloadManager`] is the default [`Offload`](gqlcache_core::Offload)
//! hook: it spawns refreshes on the tokio runtime after the stale response
//! has been returned, tracks them, and lets the host wait for them before
//! shutting down.
//!
//! ```ignore
//! use gqlcache::offload::{OffloadConfig, OffloadManager};
//! use std::time::Duration;
//!
//! let config = OffloadConfig::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build();
//! let manager = OffloadManager::new(config);
//! manager.spawn("revalidate", async { /* refresh */ });
//! manager.wait_all().await;
//! ```

mod manager;
mod policy;

pub use manager::{OffloadHandle, OffloadKey, OffloadManager};
pub use policy::{OffloadConfig, OffloadConfigBuilder, TimeoutPolicy};
