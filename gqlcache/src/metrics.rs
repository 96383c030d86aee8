//! Metrics declaration and recording.
//!
//! Everything here compiles to no-ops unless the `metrics` feature is on.

use std::time::Duration;

use gqlcache_core::CacheStatus;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Cache status metrics

    /// Track number of fresh hits.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gqlcache_cache_hit_total",
            "Total number of responses served fresh from the store."
        );
        "gqlcache_cache_hit_total"
    };
    /// Track number of misses.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gqlcache_cache_miss_total",
            "Total number of responses fetched because nothing usable was stored."
        );
        "gqlcache_cache_miss_total"
    };
    /// Track number of stale hits.
    pub static ref CACHE_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gqlcache_cache_stale_total",
            "Total number of responses served stale while refreshing."
        );
        "gqlcache_cache_stale_total"
    };
    /// Track number of store bypasses.
    pub static ref CACHE_BYPASS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gqlcache_cache_bypass_total",
            "Total number of requests that never touched the store."
        );
        "gqlcache_cache_bypass_total"
    };

    // Coalescing

    /// Track number of callers that attached to a pending upstream call.
    pub static ref COALESCED_WAITERS: &'static str = {
        metrics::describe_counter!(
            "gqlcache_coalesced_total",
            "Total number of callers that attached to a pending upstream call."
        );
        "gqlcache_coalesced_total"
    };

    // Upstream

    /// Histogram of upstream call duration.
    pub static ref UPSTREAM_DURATION: &'static str = {
        metrics::describe_histogram!(
            "gqlcache_upstream_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of upstream calls in seconds."
        );
        "gqlcache_upstream_duration_seconds"
    };

    // Background refresh

    /// Track number of refreshes that completed.
    pub static ref REVALIDATION_COMPLETED: &'static str = {
        metrics::describe_counter!(
            "gqlcache_revalidation_completed_total",
            "Total number of background refreshes that completed."
        );
        "gqlcache_revalidation_completed_total"
    };
    /// Track number of refreshes that failed.
    pub static ref REVALIDATION_FAILED: &'static str = {
        metrics::describe_counter!(
            "gqlcache_revalidation_failed_total",
            "Total number of background refreshes that failed."
        );
        "gqlcache_revalidation_failed_total"
    };

    // Store

    /// Track store errors per backend and operation.
    pub static ref STORE_ERRORS: &'static str = {
        metrics::describe_counter!(
            "gqlcache_store_errors_total",
            "Total number of store errors per backend and operation."
        );
        "gqlcache_store_errors_total"
    };

    // Offload manager

    /// Track number of offload tasks spawned.
    pub static ref OFFLOAD_TASKS_SPAWNED: &'static str = {
        metrics::describe_counter!(
            "gqlcache_offload_tasks_spawned_total",
            "Total number of offload tasks spawned."
        );
        "gqlcache_offload_tasks_spawned_total"
    };
    /// Track number of offload tasks that timed out.
    pub static ref OFFLOAD_TASKS_TIMEOUT: &'static str = {
        metrics::describe_counter!(
            "gqlcache_offload_tasks_timeout_total",
            "Total number of offload tasks that timed out."
        );
        "gqlcache_offload_tasks_timeout_total"
    };
    /// Gauge of currently active offload tasks.
    pub static ref OFFLOAD_TASKS_ACTIVE: &'static str = {
        metrics::describe_gauge!(
            "gqlcache_offload_tasks_active",
            "Number of currently active offload tasks."
        );
        "gqlcache_offload_tasks_active"
    };
    /// Histogram of offload task duration.
    pub static ref OFFLOAD_TASK_DURATION: &'static str = {
        metrics::describe_histogram!(
            "gqlcache_offload_task_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of offload tasks in seconds."
        );
        "gqlcache_offload_task_duration_seconds"
    };
}

/// Records how a response was produced.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_status(status: CacheStatus, backend: &str) {
    let counter = match status {
        CacheStatus::Hit => *CACHE_HIT_COUNTER,
        CacheStatus::Miss => *CACHE_MISS_COUNTER,
        CacheStatus::Stale => *CACHE_STALE_COUNTER,
        CacheStatus::Bypass => *CACHE_BYPASS_COUNTER,
    };
    metrics::counter!(counter, "backend" => backend.to_string()).increment(1);
}

/// No-op without the `metrics` feature.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_status(_status: CacheStatus, _backend: &str) {}

/// Records the duration of one upstream call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_upstream(duration: Duration) {
    metrics::histogram!(*UPSTREAM_DURATION).record(duration.as_secs_f64());
}

/// No-op without the `metrics` feature.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_upstream(_duration: Duration) {}

/// Records the outcome of a background refresh.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_revalidation(success: bool) {
    let counter = if success {
        *REVALIDATION_COMPLETED
    } else {
        *REVALIDATION_FAILED
    };
    metrics::counter!(counter).increment(1);
}

/// No-op without the `metrics` feature.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_revalidation(_success: bool) {}

/// Records a store failure for `operation` ("read", "write", "remove").
#[cfg(feature = "metrics")]
#[inline]
pub fn record_store_error(backend: &str, operation: &'static str) {
    metrics::counter!(
        *STORE_ERRORS,
        "backend" => backend.to_string(),
        "operation" => operation
    )
    .increment(1);
}

/// No-op without the `metrics` feature.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_store_error(_backend: &str, _operation: &'static str) {}
