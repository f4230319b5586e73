//! In-process exclusive guard
//!
//! One `parking_lot::Mutex` per product, acquired with a bounded wait. It
//! serializes callers that share this process and this guard instance; a
//! second process, or a caller that skips the guard, is not excluded.

use crate::guard::{read_counter, read_validate_apply, worker, GuardKind, StockGuard, Validate};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use stockguard_core::error::{Error, Result};
use stockguard_core::traits::KeyValueStore;
use stockguard_core::types::ProductId;

/// Table size at which locks nobody is holding get evicted
const EVICTION_THRESHOLD: usize = 1024;

/// Per-product lock table
///
/// Entries are created on first use. Once the table reaches its threshold,
/// inserting a new product first evicts every lock that only the table
/// still references.
pub(crate) struct LockTable<L> {
    locks: DashMap<ProductId, Arc<L>>,
    threshold: usize,
}

impl<L: Default> LockTable<L> {
    pub(crate) fn new() -> Self {
        Self::with_threshold(EVICTION_THRESHOLD)
    }

    pub(crate) fn with_threshold(threshold: usize) -> Self {
        Self {
            locks: DashMap::new(),
            threshold: threshold.max(1),
        }
    }

    /// Lock for `product`, created on first use
    pub(crate) fn get(&self, product: &ProductId) -> Arc<L> {
        if let Some(lock) = self.locks.get(product) {
            return Arc::clone(lock.value());
        }
        if self.locks.len() >= self.threshold {
            self.evict_idle();
        }
        Arc::clone(
            self.locks
                .entry(product.clone())
                .or_insert_with(|| Arc::new(L::default()))
                .value(),
        )
    }

    /// Drop locks that no caller holds; returns how many were dropped.
    ///
    /// Handing out a lock clones it under the shard lock, so an entry with a
    /// strong count of one cannot be in use.
    pub(crate) fn evict_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let evicted = before.saturating_sub(self.locks.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.locks.len(), "idle product locks evicted");
        }
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive in-process guard with a bounded wait
pub struct LocalExclusiveGuard {
    store: Arc<dyn KeyValueStore>,
    locks: LockTable<Mutex<()>>,
    wait: Duration,
}

impl LocalExclusiveGuard {
    /// Create a guard that waits at most `wait` for the product's lock
    pub fn new(store: Arc<dyn KeyValueStore>, wait: Duration) -> Self {
        Self {
            store,
            locks: LockTable::new(),
            wait,
        }
    }

    /// Wait budget per acquisition
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Number of products that have a lock allocated
    pub fn tracked_products(&self) -> usize {
        self.locks.len()
    }
}

impl StockGuard for LocalExclusiveGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::LocalExclusive
    }

    fn run(&self, product: &ProductId, validate: Validate<'_>) -> Result<i64> {
        let lock = self.locks.get(product);
        let Some(_held) = lock.try_lock_for(self.wait) else {
            tracing::warn!(product_id = %product, worker = %worker(), "local lock not acquired");
            return Err(Error::LockNotAcquired {
                product_id: product.to_string(),
                waited_ms: u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX),
            });
        };
        read_validate_apply(&*self.store, product, validate)
    }

    fn observe(&self, product: &ProductId) -> Result<i64> {
        read_counter(&*self.store, product)
    }
}
