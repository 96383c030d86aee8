//! Single-flight deduplication of upstream calls.
//!
//! [`RequestCoalescer`] keeps at most one in-flight upstream call per
//! [`CacheKey`]. The first caller for a key becomes the leader and its
//! producer is started; callers arriving while that call is pending attach to
//! it and receive a clone of the same outcome, success or error.
//!
//! # Lifecycle of a flight
//!
//! - **Registered** synchronously in [`RequestCoalescer::join`], under the
//!   map shard lock, so two concurrent callers can never both lead.
//! - **Settled** when the producer completes. The map entry is removed before
//!   any waiter observes the outcome, so a caller arriving after settlement
//!   always starts a new flight.
//! - **Abandoned** when every waiter dropped its [`Joined`] before
//!   settlement. The producer is dropped with the last waiter and the entry
//!   removed.
//!
//! A waiter dropping its future only detaches itself; the upstream call
//! continues as long as one waiter is left.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use gqlcache_core::CacheKey;
use tracing::{debug, warn};

use crate::error::CacheError;

type Flight<T> = Shared<BoxFuture<'static, Result<T, CacheError>>>;

struct InFlight<T> {
    id: u64,
    flight: Flight<T>,
    waiters: Arc<AtomicUsize>,
}

struct Inner<T> {
    flights: DashMap<CacheKey, InFlight<T>>,
    next_id: AtomicU64,
}

/// Per-key single-flight registry.
///
/// Cheap to clone; clones share the same registry. Each cache instance owns
/// its own coalescer, nothing is process global.
pub struct RequestCoalescer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RequestCoalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for RequestCoalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("in_flight", &self.inner.flights.len())
            .finish()
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flights: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Runs `producer` for `key` unless a call for it is already pending, in
    /// which case the pending call's outcome is awaited instead.
    pub async fn run<F, Fut>(&self, key: &CacheKey, producer: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
    {
        self.join(key, producer).await
    }

    /// Registers the caller for `key` without awaiting the outcome.
    ///
    /// `producer` is invoked only when the caller becomes the leader, and is
    /// invoked while the registry shard is locked: it must only build the
    /// future, not touch this coalescer.
    pub fn join<F, Fut>(&self, key: &CacheKey, producer: F) -> Joined<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
    {
        match self.inner.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let in_flight = occupied.get();
                let joined = Joined::attach(self, key, in_flight, false);
                debug!(
                    key = %key,
                    waiters = in_flight.waiters.load(Ordering::SeqCst),
                    "attached to in-flight upstream call"
                );
                #[cfg(feature = "metrics")]
                metrics::counter!(*crate::metrics::COALESCED_WAITERS).increment(1);
                joined
            }
            Entry::Vacant(vacant) => {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let settle = Settle {
                    inner: Arc::downgrade(&self.inner),
                    key: key.clone(),
                    id,
                };
                let work = AssertUnwindSafe(producer()).catch_unwind();
                let flight = async move {
                    // Dropped when the producer settles, before the outcome is
                    // published to any waiter.
                    let _settle = settle;
                    match work.await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!("upstream producer panicked");
                            Err(CacheError::Aborted)
                        }
                    }
                }
                .boxed()
                .shared();

                let in_flight = vacant.insert(InFlight {
                    id,
                    flight,
                    waiters: Arc::new(AtomicUsize::new(0)),
                });
                Joined::attach(self, key, in_flight.value(), true)
            }
        }
    }

    /// Number of keys with a pending upstream call.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.len()
    }

    /// Number of callers currently waiting on the call for `key`.
    pub fn waiters(&self, key: &CacheKey) -> usize {
        self.inner
            .flights
            .get(key)
            .map(|in_flight| in_flight.waiters.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

/// Removes the registry entry once its producer settles or is dropped.
struct Settle<T> {
    inner: Weak<Inner<T>>,
    key: CacheKey,
    id: u64,
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            // The removed entry is dropped after the shard lock is released.
            let _removed = inner
                .flights
                .remove_if(&self.key, |_, in_flight| in_flight.id == self.id);
        }
    }
}

/// Counts a waiter and abandons the flight when the last one leaves early.
struct Waiter<T> {
    inner: Weak<Inner<T>>,
    key: CacheKey,
    id: u64,
    waiters: Arc<AtomicUsize>,
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        if self.waiters.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            let _removed = inner.flights.remove_if(&self.key, |_, in_flight| {
                in_flight.id == self.id && in_flight.waiters.load(Ordering::SeqCst) == 0
            });
        }
    }
}

/// A caller's handle on a flight. Resolves to the flight's outcome.
///
/// Dropping it detaches this caller only.
#[must_use = "dropping a Joined detaches from the upstream call"]
pub struct Joined<T> {
    flight: Flight<T>,
    leader: bool,
    _waiter: Waiter<T>,
}

impl<T> Joined<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn attach(
        coalescer: &RequestCoalescer<T>,
        key: &CacheKey,
        in_flight: &InFlight<T>,
        leader: bool,
    ) -> Self {
        in_flight.waiters.fetch_add(1, Ordering::SeqCst);
        Self {
            flight: in_flight.flight.clone(),
            leader,
            _waiter: Waiter {
                inner: Arc::downgrade(&coalescer.inner),
                key: key.clone(),
                id: in_flight.id,
                waiters: Arc::clone(&in_flight.waiters),
            },
        }
    }

    /// Whether this caller started the upstream call.
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

impl<T> Future for Joined<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T, CacheError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().flight.poll_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlcache_core::KeyPart;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn key(name: &str) -> CacheKey {
        CacheKey::new("test", 0, vec![KeyPart::new("id", Some(name))])
    }

    #[tokio::test]
    async fn later_callers_attach() {
        let coalescer = RequestCoalescer::<u32>::new();
        let (tx, rx) = oneshot::channel::<u32>();

        let first = coalescer.join(&key("a"), move || async move {
            rx.await.map_err(|_| CacheError::Aborted)
        });
        let second = coalescer.join(&key("a"), || async { Ok(99) });

        assert!(first.is_leader());
        assert!(!second.is_leader());
        assert_eq!(coalescer.in_flight(), 1);
        assert_eq!(coalescer.waiters(&key("a")), 2);

        tx.send(7).unwrap();
        assert_eq!(first.await.unwrap(), 7);
        assert_eq!(second.await.unwrap(), 7);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let coalescer = RequestCoalescer::<u32>::new();
        let a = coalescer.join(&key("a"), || async { Ok(1) });
        let b = coalescer.join(&key("b"), || async { Ok(2) });

        assert!(a.is_leader() && b.is_leader());
        assert_eq!(coalescer.in_flight(), 2);
        assert_eq!((a.await.unwrap(), b.await.unwrap()), (1, 2));
    }

    #[tokio::test]
    async fn entry_is_removed_before_waiters_resume() {
        let coalescer = RequestCoalescer::<u32>::new();
        let probe = coalescer.clone();

        let joined = coalescer.join(&key("a"), || async { Ok(1) });
        assert_eq!(joined.await.unwrap(), 1);
        assert_eq!(probe.in_flight(), 0);

        let next = coalescer.join(&key("a"), || async { Ok(2) });
        assert!(next.is_leader());
        assert_eq!(next.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_cancel_others() {
        let coalescer = RequestCoalescer::<u32>::new();
        let (tx, rx) = oneshot::channel::<u32>();

        let leader = coalescer.join(&key("a"), move || async move {
            rx.await.map_err(|_| CacheError::Aborted)
        });
        let follower = coalescer.join(&key("a"), || async { Ok(0) });

        drop(leader);
        assert_eq!(coalescer.waiters(&key("a")), 1);

        tx.send(5).unwrap();
        assert_eq!(follower.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn abandoned_flight_is_removed() {
        let coalescer = RequestCoalescer::<u32>::new();
        let joined = coalescer.join(&key("a"), || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        });
        drop(joined);

        assert_eq!(coalescer.in_flight(), 0);
        let next = coalescer.join(&key("a"), || async { Ok(2) });
        assert!(next.is_leader());
    }

    #[tokio::test]
    async fn errors_are_shared() {
        let coalescer = RequestCoalescer::<u32>::new();
        let (tx, rx) = oneshot::channel::<()>();

        let first = coalescer.join(&key("a"), move || async move {
            let _ = rx.await;
            Err(CacheError::GraphQLResponse {
                errors: vec![crate::error::GraphQLError::new("boom")],
            })
        });
        let second = coalescer.join(&key("a"), || async { Ok(1) });
        tx.send(()).unwrap();

        for result in [first.await, second.await] {
            assert!(matches!(result, Err(CacheError::GraphQLResponse { .. })));
        }
    }

    #[tokio::test]
    async fn panicking_producer_aborts_waiters() {
        let coalescer = RequestCoalescer::<u32>::new();
        let joined = coalescer.join(&key("a"), || async {
            if true {
                panic!("producer failure");
            }
            Ok(1)
        });

        assert!(matches!(joined.await, Err(CacheError::Aborted)));
        assert_eq!(coalescer.in_flight(), 0);
    }
}
