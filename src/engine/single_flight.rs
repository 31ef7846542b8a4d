//! At most one in-flight computation per key.
//!
//! The first caller for a key starts the future and registers a shared
//! handle to it; callers arriving while it runs await the same handle and
//! receive a clone of its output. The registry lock is only held to look up
//! or insert a handle, never across an await.
//!
//! The registry keeps weak handles. Once every awaiter has gone away the
//! future is dropped, and its guard removes the entry, so a cancelled fetch
//! never lingers.

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

type Flight<V> = Shared<BoxFuture<'static, V>>;

struct Entry<V> {
    id: u64,
    handle: WeakShared<BoxFuture<'static, V>>,
}

type Registry<K, V> = Arc<Mutex<HashMap<K, Entry<V>>>>;

pub struct SingleFlight<K, V> {
    inflight: Registry<K, V>,
    next_id: Arc<AtomicU64>,
}

impl<K, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a flight in progress.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    /// Run the future built by `make` for `key`, or join the one already
    /// running. `make` is only called by the caller that starts a flight and
    /// must not touch this registry.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = self.join_or_start(key, make);
        flight.await
    }

    fn join_or_start<F, Fut>(&self, key: K, make: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = map.get(&key).and_then(|e| e.handle.upgrade()) {
            debug!(key = ?key, "Joining in-flight request");
            return existing;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = FlightGuard {
            key: key.clone(),
            id,
            inflight: Arc::clone(&self.inflight),
        };
        let fut = make();
        let flight = async move {
            let _guard = guard;
            fut.await
        }
        .boxed()
        .shared();

        if let Some(handle) = flight.downgrade() {
            map.insert(key, Entry { id, handle });
        }
        flight
    }
}

/// Unregisters a flight when its future completes or is dropped.
struct FlightGuard<K: Eq + Hash, V> {
    key: K,
    id: u64,
    inflight: Registry<K, V>,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        // A newer flight may already own the key.
        if map.get(&self.key).is_some_and(|e| e.id == self.id) {
            map.remove(&self.key);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
