//! Single-flight execution per key.
//!
//! The first caller for a key spawns the work on its own task and registers a
//! shared handle to the result. Callers arriving while it runs await the same
//! handle instead of starting a duplicate. The key is dropped from the map
//! when the work finishes, succeeds or fails, so the next call starts fresh.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{PackError, PackResult};

type SharedResult<T> = Shared<BoxFuture<'static, PackResult<T>>>;

struct Flight<T> {
    id: u64,
    result: SharedResult<T>,
}

pub struct SingleFlight<K, T> {
    inflight: DashMap<K, Flight<T>>,
    next_id: AtomicU64,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of keys with work in flight.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    /// Run `factory` for `key` unless a run is already in flight, then wait
    /// for the shared result.
    ///
    /// `cancel` only stops this caller from waiting. The work itself is
    /// stopped by whatever token the factory captured.
    pub async fn run<F, Fut>(
        self: &Arc<Self>,
        key: K,
        cancel: CancellationToken,
        factory: F,
    ) -> PackResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PackResult<T>> + Send + 'static,
    {
        let shared = match self.inflight.entry(key.clone()) {
            Entry::Occupied(e) => e.get().result.clone(),
            Entry::Vacant(e) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let shared: SharedResult<T> = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(PackError::Internal("packaging task ended without a result".into()))
                    })
                }
                .boxed()
                .shared();
                e.insert(Flight {
                    id,
                    result: shared.clone(),
                });

                let work = factory();
                let guard = FlightGuard {
                    registry: Arc::clone(self),
                    key,
                    id,
                };
                tokio::spawn(async move {
                    let result = work.await;
                    drop(guard);
                    let _ = tx.send(result);
                });

                shared
            }
        };

        tokio::select! {
            result = shared => result,
            _ = cancel.cancelled() => Err(PackError::Cancelled),
        }
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the flight when the work finishes or its task unwinds.
struct FlightGuard<K: Eq + Hash, T> {
    registry: Arc<SingleFlight<K, T>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, T> Drop for FlightGuard<K, T> {
    fn drop(&mut self) {
        let id = self.id;
        self.registry.inflight.remove_if(&self.key, |_, f| f.id == id);
    }
}
