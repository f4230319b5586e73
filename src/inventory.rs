//! Inventory operations.
//!
//! [`Inventory`] is the entry point for all stock mutations. Each operation
//! validates its input, runs the read → validate → mutate sequence under a
//! guard, and re-checks the value the store returned.

use crate::config::InventoryConfig;
use crate::rules;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stockguard_concurrency::{
    AcquireMode, DistributedLock, GuardKind, Guards, LockOwnership, RetryPolicy,
};
use stockguard_core::error::{Error, Result};
use stockguard_core::keys::{self, KeyKind};
use stockguard_core::traits::KeyValueStore;
use stockguard_core::types::{OrderId, ProductId};

/// Oversell-safe stock counters over a [`KeyValueStore`].
///
/// Create one with [`Inventory::new`] or [`Inventory::builder`]. Local guards
/// only serialize callers that share the same `Inventory`, so share it
/// between threads behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// use stockguard::prelude::*;
///
/// let inventory = Inventory::builder()
///     .store(Arc::new(MemoryStore::new()))
///     .guard(GuardKind::Distributed)
///     .build()?;
///
/// let product = ProductId::new("11002")?;
/// let sold = inventory.increment_sold(&product, 1000, 10)?;
/// ```
pub struct Inventory {
    store: Arc<dyn KeyValueStore>,
    guards: Guards,
    config: InventoryConfig,
}

impl Inventory {
    /// Create an inventory with the default configuration (no guard).
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, InventoryConfig::default())
    }

    /// Create an inventory with an explicit configuration.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: InventoryConfig) -> Self {
        let guards = Guards::new(Arc::clone(&store), &config.lock);
        Self {
            store,
            guards,
            config,
        }
    }

    /// Create a builder for inventory configuration.
    pub fn builder() -> InventoryBuilder {
        InventoryBuilder::new()
    }

    /// Active configuration.
    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Every guard variant, sharing this inventory's lock tables.
    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    // =========================================================================
    // Decrement flow
    // =========================================================================

    /// Sell `buy` units from a counter that holds the remaining stock.
    ///
    /// Uses the configured guard. Returns the remaining stock.
    ///
    /// # Errors
    ///
    /// - `InsufficientStock` if the counter is at or below zero
    /// - `SaleExceedsRemaining` if the sale would take it to zero or below
    /// - `OverdraftOccurred` if a concurrent caller slipped in between the read
    ///   and the decrement and the counter is now negative; the decrement
    ///   has been applied and should be compensated with [`Inventory::restock`]
    pub fn decrement_stock(&self, product: &ProductId, buy: i64) -> Result<i64> {
        self.decrement_stock_with(self.config.guard, product, buy)
    }

    /// [`Inventory::decrement_stock`] under an explicit guard.
    pub fn decrement_stock_with(&self, kind: GuardKind, product: &ProductId, buy: i64) -> Result<i64> {
        rules::check_quantity("buy quantity", buy)?;
        let guard = self.guards.get(kind);
        let value = self.config.retry.run(|_| {
            guard.run(product, &|current| rules::decrement_delta(product, current, buy))
        })?;
        rules::check_floor(product, value, -buy)
    }

    // =========================================================================
    // Increment flow
    // =========================================================================

    /// Record `buy` sold units against a cap of `total`.
    ///
    /// Uses the configured guard. Returns the sold count.
    ///
    /// # Errors
    ///
    /// - `InsufficientStock` if the sold count already reached `total`
    /// - `SaleExceedsRemaining` if `buy` does not fit below `total`
    /// - `OverdraftOccurred` if the increment was applied and overshot
    ///   `total` (only possible without an effective guard)
    /// - `LockNotAcquired` / `TransactionConflict` once the retry policy
    ///   gives up; nothing was written
    pub fn increment_sold(&self, product: &ProductId, total: i64, buy: i64) -> Result<i64> {
        self.increment_sold_with(self.config.guard, product, total, buy)
    }

    /// [`Inventory::increment_sold`] under an explicit guard.
    pub fn increment_sold_with(
        &self,
        kind: GuardKind,
        product: &ProductId,
        total: i64,
        buy: i64,
    ) -> Result<i64> {
        rules::check_total(total)?;
        rules::check_quantity("buy quantity", buy)?;

        let guard = self.guards.get(kind);
        let value = self.config.retry.run(|attempt| {
            if attempt > 1 {
                tracing::debug!(product_id = %product, guard = %kind, attempt, "retrying sale");
            }
            guard.run(product, &|current| {
                rules::increment_delta(product, current, total, buy)
            })
        })?;
        let value = rules::check_cap(product, value, buy, total)?;
        tracing::info!(product_id = %product, guard = %kind, result = value, total, "sale recorded");
        Ok(value)
    }

    /// Increment flow under the in-process exclusive lock.
    pub fn increment_sold_local_locked(&self, product: &ProductId, total: i64, buy: i64) -> Result<i64> {
        self.increment_sold_with(GuardKind::LocalExclusive, product, total, buy)
    }

    /// Increment flow under the in-process stamped write lock.
    pub fn increment_sold_rw_locked(&self, product: &ProductId, total: i64, buy: i64) -> Result<i64> {
        self.increment_sold_with(GuardKind::LocalReadWrite, product, total, buy)
    }

    /// Increment flow under the distributed lock.
    pub fn increment_sold_distributed_locked(
        &self,
        product: &ProductId,
        total: i64,
        buy: i64,
    ) -> Result<i64> {
        self.increment_sold_with(GuardKind::Distributed, product, total, buy)
    }

    /// Increment flow inside a watch/multi/exec transaction.
    pub fn increment_sold_optimistic(&self, product: &ProductId, total: i64, buy: i64) -> Result<i64> {
        self.increment_sold_with(GuardKind::Optimistic, product, total, buy)
    }

    // =========================================================================
    // Order-set flow
    // =========================================================================

    /// Account a sale by adding `order` to the product's order set.
    ///
    /// The set's cardinality is the sold count, so recording the same order
    /// twice counts it once. `buy` only takes part in validation; one order
    /// adds one member. Returns the cardinality after the add.
    ///
    /// A duplicate that finds the set already past `total` fails with
    /// `InsufficientStock`; only a call that added its order can report
    /// `OverdraftOccurred`.
    pub fn record_unique_order(
        &self,
        order: &OrderId,
        product: &ProductId,
        total: i64,
        buy: i64,
    ) -> Result<u64> {
        rules::check_total(total)?;
        rules::check_quantity("buy quantity", buy)?;

        let key = keys::order_set_key(product);
        let current = cardinality_as_i64(&key, self.store.set_cardinality(&key)?)?;
        tracing::debug!(product_id = %product, current, "order set read");
        rules::increment_delta(product, current, total, buy)?;

        let added = self.store.set_add(&key, order.as_str())?;
        let count = self.store.set_cardinality(&key)?;
        rules::check_order_cap(product, cardinality_as_i64(&key, count)?, added, total)?;
        tracing::info!(product_id = %product, order_id = %order, added, result = count, "order recorded");
        Ok(count)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current counter value (0 if absent), read through the configured guard.
    pub fn stock_level(&self, product: &ProductId) -> Result<i64> {
        self.guards.get(self.config.guard).observe(product)
    }

    /// Number of distinct orders recorded for `product`.
    pub fn order_count(&self, product: &ProductId) -> Result<u64> {
        self.store.set_cardinality(&keys::order_set_key(product))
    }

    /// Whether `order` is recorded for `product`.
    pub fn has_order(&self, order: &OrderId, product: &ProductId) -> Result<bool> {
        self.store
            .set_contains(&keys::order_set_key(product), order.as_str())
    }

    // =========================================================================
    // Compensation and setup
    // =========================================================================

    /// Put `quantity` units back on a decrement-flow counter.
    pub fn restock(&self, product: &ProductId, quantity: i64) -> Result<i64> {
        rules::check_quantity("restock quantity", quantity)?;
        let value = self.store.incr_by(&keys::counter_key(product), quantity)?;
        tracing::info!(product_id = %product, delta = quantity, result = value, "stock restocked");
        Ok(value)
    }

    /// Take `quantity` units off an increment-flow sold count.
    ///
    /// Runs under the configured guard and never takes the count below zero.
    pub fn refund_sold(&self, product: &ProductId, quantity: i64) -> Result<i64> {
        rules::check_quantity("refund quantity", quantity)?;
        let guard = self.guards.get(self.config.guard);
        let value = self.config.retry.run(|_| {
            guard.run(product, &|current| rules::refund_delta(product, current, quantity))
        })?;
        tracing::info!(product_id = %product, delta = -quantity, result = value, "sale refunded");
        Ok(value)
    }

    /// Remove `order` from the product's order set.
    pub fn release_order(&self, order: &OrderId, product: &ProductId) -> Result<bool> {
        let removed = self
            .store
            .set_remove(&keys::order_set_key(product), order.as_str())?;
        if removed {
            tracing::info!(product_id = %product, order_id = %order, "order released");
        }
        Ok(removed)
    }

    /// Add `quantity` to the counter, creating it if absent.
    pub fn seed_stock(&self, product: &ProductId, quantity: i64) -> Result<i64> {
        if quantity < 0 {
            return Err(Error::InvalidInput(format!(
                "seed quantity must not be negative, got {quantity}"
            )));
        }
        self.store.incr_by(&keys::counter_key(product), quantity)
    }

    /// Delete the counter, order set and lock key of `product`.
    pub fn clear(&self, product: &ProductId) -> Result<()> {
        for kind in KeyKind::ALL {
            self.store.delete(&kind.key(product))?;
        }
        tracing::debug!(product_id = %product, "product keys cleared");
        Ok(())
    }

    // =========================================================================
    // Distributed lock
    // =========================================================================

    /// The distributed lock used by the `Distributed` guard.
    pub fn distributed_lock(&self) -> &DistributedLock {
        self.guards.distributed_lock()
    }

    /// Take the distributed lock for `product`; `true` iff acquired.
    pub fn try_lock(&self, product: &ProductId, timeout: Duration) -> Result<bool> {
        self.distributed_lock().try_lock(product, timeout)
    }

    /// Release a lock taken with [`Inventory::try_lock`].
    pub fn try_unlock(&self, product: &ProductId) -> Result<bool> {
        self.distributed_lock().try_unlock(product)
    }
}

fn cardinality_as_i64(key: &str, count: u64) -> Result<i64> {
    i64::try_from(count).map_err(|_| Error::Internal(format!("cardinality of {key} overflows i64")))
}

/// Builder for [`Inventory`].
///
/// # Example
///
/// ```ignore
/// let inventory = Inventory::builder()
///     .store(store)
///     .guard(GuardKind::Optimistic)
///     .retry(RetryPolicy::with_attempts(5))
///     .build()?;
/// ```
#[derive(Default)]
pub struct InventoryBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    config: InventoryConfig,
}

impl InventoryBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing store (required).
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace every setting with `config`.
    pub fn config(mut self, config: InventoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Default guard.
    pub fn guard(mut self, guard: GuardKind) -> Self {
        self.config.guard = guard;
        self
    }

    /// Wait budget of the local guards (and of bounded polling).
    pub fn lock_wait(mut self, wait: Duration) -> Self {
        self.config.lock.wait = wait;
        self
    }

    /// Expiry of distributed lock keys.
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.config.lock.ttl = ttl;
        self
    }

    /// Acquisition strategy of the distributed lock.
    pub fn lock_acquire(mut self, acquire: AcquireMode) -> Self {
        self.config.lock.acquire = acquire;
        self
    }

    /// Ownership mode of the distributed lock.
    pub fn lock_ownership(mut self, ownership: LockOwnership) -> Self {
        self.config.lock.ownership = ownership;
        self
    }

    /// Retry policy for lock timeouts and conflicts.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the inventory.
    ///
    /// Fails with `InvalidInput` if no store was set or the lock TTL is zero
    /// or too large to be turned into a deadline.
    pub fn build(self) -> Result<Inventory> {
        let store = self
            .store
            .ok_or_else(|| Error::InvalidInput("inventory builder requires a store".into()))?;
        let ttl = self.config.lock.ttl;
        if ttl.is_zero() {
            return Err(Error::InvalidInput("lock ttl must be positive".into()));
        }
        if Instant::now().checked_add(ttl).is_none() {
            return Err(Error::InvalidInput(format!("lock ttl is out of range: {ttl:?}")));
        }
        Ok(Inventory::with_config(store, self.config))
    }
}
