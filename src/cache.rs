//! Single-flight cache for expensive per-snapshot computations.
//!
//! For a given key, at most one computation is ever in flight: competing
//! callers await the same result instead of issuing redundant expensive
//! work. This is the central correctness property of the whole service.
//!
//! # Semantics
//!
//! - `get_or_compute` returns a cached value, joins an in-flight
//!   computation, or starts one — atomically with respect to other callers.
//! - Each flight runs on a detached task. A caller disconnecting mid-flight
//!   does not cancel the computation; it runs to completion and its result
//!   is stored for future reuse.
//! - A failed computation is broadcast identically to every waiter of that
//!   flight and then discarded, so the next request recomputes. Failures
//!   are never cached.
//! - `invalidate_all` logically discards every entry. Entries keyed by a
//!   stale snapshot token are additionally never matched again (lazy
//!   invalidation), since lookups always carry the current token.
//! - Capacity is bounded: oldest completed entries are evicted first. An
//!   in-flight entry is never evicted out from under its waiters.
//!
//! No partial or corrupt value is ever observable: a flight resolves to
//! either one complete value or one error, and all waiters see that one
//! outcome.

use crate::error::{GraphServiceError, Result};
use crate::snapshot::SnapshotToken;
use ahash::AHashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Cache key: snapshot token plus a hash of the node-id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Corpus state the entry was computed against
    pub token: SnapshotToken,
    /// blake3 hash of the sorted node-id set
    pub node_set_hash: [u8; 32],
}

/// Cache statistics for monitoring effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a completed entry
    pub hits: u64,
    /// Lookups that started or joined a computation
    pub misses: u64,
    /// Completed entries currently held
    pub size: usize,
    /// Computations currently in flight
    pub in_flight: usize,
}

/// `None` while the flight is running, `Some` once it resolved.
type FlightSlot<V> = Option<Result<Arc<V>>>;

struct Inner<V> {
    entries: AHashMap<CacheKey, watch::Receiver<FlightSlot<V>>>,
    /// Insertion order, oldest first; drives eviction
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

/// Bounded key/value store with single-flight compute semantics.
pub struct CacheStore<V> {
    capacity: usize,
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V: Send + Sync + 'static> CacheStore<V> {
    /// Create a store holding at most `capacity` completed entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(Inner {
                entries: AHashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // A panicked holder cannot leave a flight map in a torn state:
        // all mutations below are single-step inserts/removes.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached value for `key`, or compute it exactly once.
    ///
    /// Concurrent callers with the same key block on the in-flight
    /// computation and all observe its single result (or its single
    /// failure). The computation itself runs on a detached task, so it
    /// survives every waiter being dropped; on success the value is stored
    /// before any waiter returns, on failure the entry is dropped before
    /// the broadcast.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut rx = {
            let mut inner = self.lock();
            if let Some(rx) = inner.entries.get(&key).cloned() {
                if rx.borrow().is_some() {
                    inner.hits += 1;
                } else {
                    // Joining an in-flight computation still counts as a
                    // miss: the expensive work was not yet done.
                    inner.misses += 1;
                }
                rx
            } else {
                inner.misses += 1;
                let (tx, rx) = watch::channel(None);
                inner.entries.insert(key, rx.clone());
                inner.order.push_back(key);
                Self::evict_completed(&mut inner, self.capacity);

                let future = compute();
                let store = Arc::clone(&self.inner);
                let flight = rx.clone();
                tokio::spawn(async move {
                    let result = future.await.map(Arc::new);
                    if result.is_err() {
                        // Drop the failed entry before the broadcast so no
                        // newcomer can join a flight that already failed.
                        let mut inner = store.lock().unwrap_or_else(|e| e.into_inner());
                        Self::remove_flight(&mut inner, &key, &flight);
                    }
                    let _ = tx.send(Some(result));
                });
                rx
            }
        };

        let slot = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone(),
            Err(_closed) => None,
        };
        match slot {
            Some(result) => result,
            None => {
                // The flight task died without resolving (panicked compute).
                // Clear the dead entry so the next request starts fresh.
                let mut inner = self.lock();
                Self::remove_flight(&mut inner, &key, &rx);
                Err(GraphServiceError::Internal(
                    "computation aborted before producing a result".into(),
                ))
            }
        }
    }

    /// Logically discard all entries.
    ///
    /// Waiters of an in-flight computation still receive its result; the
    /// result is just no longer retained here.
    pub fn invalidate_all(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let in_flight = inner
            .entries
            .values()
            .filter(|rx| rx.borrow().is_none())
            .count();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len() - in_flight,
            in_flight,
        }
    }

    /// Number of entries currently held (completed and in flight).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `key` only if the slot still holds this exact flight; a
    /// concurrent invalidate_all or recompute may have replaced it.
    fn remove_flight(
        inner: &mut Inner<V>,
        key: &CacheKey,
        flight: &watch::Receiver<FlightSlot<V>>,
    ) {
        if inner
            .entries
            .get(key)
            .is_some_and(|stored| stored.same_channel(flight))
        {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
        }
    }

    /// Evict oldest completed entries until within capacity.
    ///
    /// In-flight entries are skipped; if everything is in flight the store
    /// temporarily exceeds capacity rather than orphaning waiters.
    fn evict_completed(inner: &mut Inner<V>, capacity: usize) {
        while inner.entries.len() > capacity {
            let victim = inner.order.iter().position(|key| {
                inner
                    .entries
                    .get(key)
                    .is_some_and(|rx| rx.borrow().is_some())
            });
            match victim {
                Some(pos) => {
                    if let Some(key) = inner.order.remove(pos) {
                        inner.entries.remove(&key);
                    }
                }
                None => break,
            }
        }
    }
}
