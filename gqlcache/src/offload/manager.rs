//! OffloadManager implementation for background task execution.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use smol_str::SmolStr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span, warn};

use super::policy::{OffloadConfig, TimeoutPolicy};

#[cfg(feature = "metrics")]
use crate::metrics::{
    OFFLOAD_TASK_DURATION, OFFLOAD_TASKS_ACTIVE, OFFLOAD_TASKS_SPAWNED, OFFLOAD_TASKS_TIMEOUT,
};

/// Identifies an offloaded task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OffloadKey {
    /// Kind of the task (e.g., "revalidate").
    pub kind: SmolStr,
    /// Unique identifier within the manager.
    pub id: u64,
}

impl fmt::Display for OffloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Handle to a spawned offload task.
#[derive(Debug)]
pub struct OffloadHandle {
    handle: JoinHandle<()>,
}

impl OffloadHandle {
    /// Check if the task is finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[derive(Debug)]
struct OffloadManagerInner {
    config: OffloadConfig,
    tasks: DashMap<OffloadKey, OffloadHandle>,
    key_counter: AtomicU64,
}

/// Spawns background tasks on the tokio runtime and keeps track of them.
///
/// Clones share the same task table. Spawning requires a running tokio
/// runtime.
#[derive(Clone, Debug)]
pub struct OffloadManager {
    inner: Arc<OffloadManagerInner>,
}

impl OffloadManager {
    /// Create a new OffloadManager with the given configuration.
    pub fn new(config: OffloadConfig) -> Self {
        Self {
            inner: Arc::new(OffloadManagerInner {
                config,
                tasks: DashMap::new(),
                key_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Create a new OffloadManager with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(OffloadConfig::default())
    }

    /// Spawn a task labelled with `kind`.
    ///
    /// The kind is used for metrics labels and tracing.
    pub fn spawn<F>(&self, kind: impl Into<SmolStr>, task: F) -> OffloadKey
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = OffloadKey {
            kind: kind.into(),
            id: self.inner.key_counter.fetch_add(1, Ordering::Relaxed),
        };

        // The task waits for its handle to be tracked, so its own removal on
        // completion always comes after the insert.
        let (start, started) = oneshot::channel();
        let handle = self.spawn_inner(task, key.clone(), started);
        self.inner.tasks.insert(key.clone(), handle);
        let _ = start.send(());

        #[cfg(feature = "metrics")]
        {
            metrics::counter!(*OFFLOAD_TASKS_SPAWNED, "kind" => key.kind.to_string()).increment(1);
            metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "kind" => key.kind.to_string()).increment(1.0);
        }

        key
    }

    /// Get the number of currently active tasks.
    pub fn active_task_count(&self) -> usize {
        self.inner.tasks.iter().filter(|e| !e.is_finished()).count()
    }

    /// Get the total number of tracked tasks (including finished).
    pub fn total_task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Clean up finished task handles.
    pub fn cleanup_finished(&self) {
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
    }

    /// Cancel all running tasks.
    pub fn cancel_all(&self) {
        self.inner.tasks.retain(|_, handle| {
            handle.abort();
            false
        });
    }

    /// Cancel a specific task by key.
    pub fn cancel(&self, key: &OffloadKey) -> bool {
        match self.inner.tasks.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Check if a task with the given key is in flight.
    pub fn is_in_flight(&self, key: &OffloadKey) -> bool {
        self.inner.tasks.get(key).is_some_and(|h| !h.is_finished())
    }

    /// Wait for all currently tracked tasks to complete.
    ///
    /// Tasks spawned while waiting are waited for as well.
    pub async fn wait_all(&self) {
        loop {
            self.cleanup_finished();

            if self.inner.tasks.is_empty() {
                break;
            }

            tokio::task::yield_now().await;
        }
    }

    /// Wait for all tasks with a timeout.
    ///
    /// Returns `true` if all tasks completed within the timeout,
    /// `false` if the timeout was reached.
    pub async fn wait_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }

    fn spawn_inner<F>(
        &self,
        task: F,
        key: OffloadKey,
        started: oneshot::Receiver<()>,
    ) -> OffloadHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timeout_policy = self.inner.config.timeout_policy;
        let inner = self.inner.clone();

        let span = info_span!("offload_task", kind = %key.kind, id = key.id);

        let handle = tokio::spawn(
            async move {
                let _ = started.await;
                let start = Instant::now();
                match timeout_policy {
                    TimeoutPolicy::None => task.await,
                    TimeoutPolicy::Cancel(duration) => {
                        if tokio::time::timeout(duration, task).await.is_err() {
                            warn!(key = %key, "offload task cancelled due to timeout");
                            #[cfg(feature = "metrics")]
                            metrics::counter!(
                                *OFFLOAD_TASKS_TIMEOUT,
                                "kind" => key.kind.to_string()
                            )
                            .increment(1);
                        }
                    }
                    TimeoutPolicy::Warn(duration) => {
                        task.await;
                        let elapsed = start.elapsed();
                        if elapsed > duration {
                            warn!(
                                key = %key,
                                elapsed_ms = elapsed.as_millis() as u64,
                                threshold_ms = duration.as_millis() as u64,
                                "offload task exceeded timeout threshold"
                            );
                        }
                    }
                }
                inner.tasks.remove(&key);
                Self::record_completion(start, &key.kind);
            }
            .instrument(span),
        );

        OffloadHandle { handle }
    }

    #[cfg(feature = "metrics")]
    fn record_completion(start: Instant, kind: &SmolStr) {
        let duration = start.elapsed().as_secs_f64();
        metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "kind" => kind.to_string()).decrement(1.0);
        metrics::histogram!(*OFFLOAD_TASK_DURATION, "kind" => kind.to_string()).record(duration);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_completion(_start: Instant, _kind: &SmolStr) {}
}

impl Default for OffloadManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl gqlcache_core::Offload for OffloadManager {
    fn spawn<F>(&self, kind: impl Into<SmolStr>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        OffloadManager::spawn(self, kind, future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn wait_all_drains_tasks() {
        let manager = OffloadManager::default();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = done.clone();
            manager.spawn("test", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        manager.wait_all().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(manager.total_task_count(), 0);
    }

    #[tokio::test]
    async fn cancel_policy_stops_long_tasks() {
        let config = OffloadConfig::builder()
            .timeout(Duration::from_millis(20))
            .build();
        let manager = OffloadManager::new(config);
        let done = Arc::new(AtomicUsize::new(0));

        let flag = done.clone();
        manager.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.fetch_add(1, Ordering::SeqCst);
        });

        assert!(manager.wait_all_timeout(Duration::from_secs(1)).await);
        assert_eq!(done.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn finished_tasks_leave_the_table() {
        let manager = OffloadManager::default();
        for _ in 0..2_000 {
            manager.spawn("noop", async {});
        }

        // No `wait_all` here: it would sweep leftovers itself.
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while manager.total_task_count() > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "{} handles left", manager.total_task_count());
    }

    #[tokio::test]
    async fn cancel_untracks_the_task() {
        let manager = OffloadManager::default();
        let key = manager.spawn("slow", tokio::time::sleep(Duration::from_secs(5)));

        assert!(manager.is_in_flight(&key));
        assert!(manager.cancel(&key));
        assert!(!manager.is_in_flight(&key));
        assert_eq!(manager.total_task_count(), 0);
        assert!(!manager.cancel(&key));
    }

    #[tokio::test]
    async fn keys_are_unique_per_spawn() {
        let manager = OffloadManager::default();
        let a = manager.spawn("revalidate", async {});
        let b = manager.spawn("revalidate", async {});

        assert_ne!(a, b);
        assert_eq!(a.kind, "revalidate");
        manager.wait_all().await;
    }
}
