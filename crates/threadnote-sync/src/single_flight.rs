//! Sharing one in-progress computation between overlapping callers.
//!
//! [`KeyedFlight`] holds at most one in-flight future per key. A caller that
//! arrives while one is running awaits the same shared future and receives a
//! clone of its output. The slot is cleared by a guard owned by the future
//! itself, so it is released exactly once: when the work finishes, or when
//! every caller has dropped it. The table only keeps weak handles, so an
//! abandoned flight does not outlive its callers.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

type Flight<T> = Shared<BoxFuture<'static, T>>;
type Slots<K, T> = Arc<Mutex<HashMap<K, (u64, WeakShared<BoxFuture<'static, T>>)>>>;

pub struct KeyedFlight<K, T: Clone> {
    slots: Slots<K, T>,
    next_id: AtomicU64,
}

impl<K, T: Clone> Default for KeyedFlight<K, T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, T: Clone> std::fmt::Debug for KeyedFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedFlight").finish_non_exhaustive()
    }
}

struct ClearSlot<K: Eq + Hash, T: Clone> {
    slots: Slots<K, T>,
    key: Option<K>,
    id: u64,
}

impl<K: Eq + Hash, T: Clone> Drop for ClearSlot<K, T> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&key).is_some_and(|(id, _)| *id == self.id) {
            slots.remove(&key);
        }
    }
}

impl<K, T> KeyedFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the flight for `key`, starting it with `start` if none is
    /// running. `start` is only called when a new flight begins.
    pub fn join<F, Fut>(&self, key: K, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slots.get(&key).and_then(|(_, weak)| weak.upgrade()) {
            return existing;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = ClearSlot {
            slots: Arc::clone(&self.slots),
            key: Some(key.clone()),
            id,
        };
        let work = start();
        let flight = async move {
            let _guard = guard;
            work.await
        }
        .boxed()
        .shared();
        if let Some(weak) = flight.downgrade() {
            slots.insert(key, (id, weak));
        }
        flight
    }

    #[must_use]
    pub fn is_running(&self, key: &K) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

/// A [`KeyedFlight`] with a single slot.
pub struct SingleFlight<T: Clone> {
    inner: KeyedFlight<(), T>,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inner: KeyedFlight::default(),
        }
    }
}

impl<T: Clone> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the future built by `start` unless a run is already in flight,
    /// in which case the caller shares that run's result.
    pub async fn run_exclusive<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = self.inner.join((), start);
        flight.await
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running(&())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn overlapping_callers_share_one_run() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let runs = Arc::new(AtomicU32::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let first = {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            tokio::spawn(async move {
                flight
                    .run_exclusive(move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        let _ = gate.await;
                        7
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(flight.is_running());

        let second = {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            tokio::spawn(async move {
                flight
                    .run_exclusive(move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        99
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        release.send(()).unwrap();

        assert_eq!(first.await.unwrap(), 7);
        assert_eq!(second.await.unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!flight.is_running());
    }

    #[tokio::test]
    async fn slot_is_released_after_completion() {
        let flight = SingleFlight::<u32>::new();
        assert_eq!(flight.run_exclusive(|| async { 1 }).await, 1);
        assert_eq!(flight.run_exclusive(|| async { 2 }).await, 2);
    }

    #[tokio::test]
    async fn slot_is_released_when_every_caller_drops() {
        let flight = SingleFlight::<u32>::new();
        let pending = flight.run_exclusive(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            1
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(!flight.is_running());
    }

    #[tokio::test]
    async fn keys_fly_independently() {
        let flights = KeyedFlight::<&'static str, u32>::new();
        let a = flights.join("a", || async { 1 });
        let b = flights.join("b", || async { 2 });
        assert!(flights.is_running(&"a"));
        assert_eq!((a.await, b.await), (1, 2));
        assert!(!flights.is_running(&"a"));
    }
}
