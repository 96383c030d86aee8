//! Background-task hook.
//!
//! Stale-while-revalidate needs somewhere to run the refresh after the
//! caller already has its response. The host runtime provides that place by
//! implementing [`Offload`]. The `gqlcache` crate ships `OffloadManager`,
//! which spawns onto tokio and can be drained before a request context is
//! torn down.

use std::future::Future;

use smol_str::SmolStr;

/// Runs futures after the current response has been produced.
///
/// Implementations must poll the future to completion independently of the
/// caller and must not let its outcome reach the caller. Futures handed over
/// by the cache already catch and log their own errors.
///
/// # Clone bound
///
/// Implementors should use `Arc` internally so every clone shares the same
/// task bookkeeping.
///
/// # Example
///
/// ```ignore
/// use gqlcache_core::Offload;
///
/// fn refresh_later<O: Offload>(offload: &O) {
///     offload.spawn("revalidate", async move {
///         // refresh logic
///     });
/// }
/// ```
pub trait Offload: Send + Sync + Clone {
    /// Hands a future over for background execution.
    ///
    /// `kind` labels the task (e.g. "revalidate") for tracing and metrics.
    fn spawn<F>(&self, kind: impl Into<SmolStr>, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
