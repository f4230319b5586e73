//! Optimistic guard over watch/multi/exec
//!
//! No lock is held. The counter key is watched, read and validated; the delta
//! is queued and committed. A write to the key by anyone in between aborts the
//! commit and the caller gets `TransactionConflict` with nothing applied.
//! There is no retry here; wrap calls in a `RetryPolicy` to get one.

use crate::guard::{read_counter, worker, GuardKind, StockGuard, Validate};
use crate::transaction::Transaction;
use std::sync::Arc;
use stockguard_core::error::{Error, Result};
use stockguard_core::keys;
use stockguard_core::traits::KeyValueStore;
use stockguard_core::types::ProductId;

/// Guard that detects concurrent writes instead of preventing them
pub struct OptimisticGuard {
    store: Arc<dyn KeyValueStore>,
}

impl OptimisticGuard {
    /// Create a guard over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl StockGuard for OptimisticGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::Optimistic
    }

    fn run(&self, product: &ProductId, validate: Validate<'_>) -> Result<i64> {
        let key = keys::counter_key(product);
        let mut txn = Transaction::begin(&*self.store);
        txn.watch(&key)?;

        let current = txn.get_counter(&key)?.unwrap_or(0);
        tracing::debug!(product_id = %product, current, worker = %worker(), "stock read under watch");

        let delta = match validate(current) {
            Ok(delta) => delta,
            Err(e) => {
                txn.discard(e.to_string());
                return Err(e);
            }
        };
        txn.incr_by(&key, delta)?;

        let results = match txn.exec() {
            Ok(results) => results,
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(product_id = %product, current, worker = %worker(), "transaction conflict");
                }
                return Err(e);
            }
        };
        let value = results
            .first()
            .copied()
            .ok_or_else(|| Error::Internal(format!("exec on {key} returned no result")))?;
        tracing::info!(product_id = %product, delta, result = value, worker = %worker(), "stock committed");
        Ok(value)
    }

    fn observe(&self, product: &ProductId) -> Result<i64> {
        read_counter(&*self.store, product)
    }
}
