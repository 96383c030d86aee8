use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gqlcache::{Offload, OffloadManager};
use smol_str::SmolStr;

/// Offload hook that counts scheduled tasks and runs them on an [`OffloadManager`].
#[derive(Clone, Default)]
pub struct RecordingOffload {
    scheduled: Arc<AtomicUsize>,
    manager: OffloadManager,
}

impl RecordingOffload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub async fn wait_all(&self) {
        self.manager.wait_all().await;
    }
}

impl Offload for RecordingOffload {
    fn spawn<F>(&self, kind: impl Into<SmolStr>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        self.manager.spawn(kind, future);
    }
}
