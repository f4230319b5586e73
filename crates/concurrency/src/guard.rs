//! Guard capability shared by every concurrency strategy
//!
//! A guard wraps the read → validate → mutate sequence on one product's
//! stock counter. The inventory layer supplies the validation as a closure
//! that maps the current value to the delta to apply (or a rejection); the
//! guard decides how the sequence is protected:
//!
//! | Kind | Protection | Scope |
//! |------|------------|-------|
//! | `None` | none, races are possible | - |
//! | `LocalExclusive` | per-product mutex, bounded wait | one process |
//! | `LocalReadWrite` | per-product stamped write lock, bounded wait | one process |
//! | `Distributed` | lock key in the store, self-expiring | all guard-aware callers |
//! | `Optimistic` | watch/multi/exec, abort on concurrent write | all callers |

use crate::distributed::{DistributedGuard, DistributedLock, LockSettings};
use crate::local::LocalExclusiveGuard;
use crate::optimistic::OptimisticGuard;
use crate::stamped::LocalReadWriteGuard;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stockguard_core::error::Result;
use stockguard_core::keys;
use stockguard_core::traits::KeyValueStore;
use stockguard_core::types::ProductId;

/// Validation step: current value in, delta to apply out
pub type Validate<'a> = &'a dyn Fn(i64) -> Result<i64>;

/// Selectable guard variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// No guard; demonstrates the read/write race
    #[default]
    None,
    /// In-process exclusive lock
    LocalExclusive,
    /// In-process stamped write lock
    LocalReadWrite,
    /// Lock token in the store
    Distributed,
    /// Watch/multi/exec transaction
    Optimistic,
}

impl GuardKind {
    /// Every variant, in declaration order
    pub const ALL: [GuardKind; 5] = [
        GuardKind::None,
        GuardKind::LocalExclusive,
        GuardKind::LocalReadWrite,
        GuardKind::Distributed,
        GuardKind::Optimistic,
    ];

    /// Stable label used in log fields
    pub fn as_str(self) -> &'static str {
        match self {
            GuardKind::None => "none",
            GuardKind::LocalExclusive => "local_exclusive",
            GuardKind::LocalReadWrite => "local_read_write",
            GuardKind::Distributed => "distributed",
            GuardKind::Optimistic => "optimistic",
        }
    }

    /// Whether this guard serializes critical sections or detects conflicts
    pub fn prevents_races(self) -> bool {
        !matches!(self, GuardKind::None)
    }
}

impl std::fmt::Display for GuardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concurrency-control strategy around one counter mutation
pub trait StockGuard: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> GuardKind;

    /// Read the counter, validate, apply the returned delta.
    ///
    /// Returns the counter value right after the mutation. If `validate`
    /// fails, or the guard cannot be taken, nothing is written.
    fn run(&self, product: &ProductId, validate: Validate<'_>) -> Result<i64>;

    /// Read the current counter value (0 if absent)
    fn observe(&self, product: &ProductId) -> Result<i64>;
}

/// Name of the calling worker for log fields
pub fn worker() -> String {
    let current = std::thread::current();
    match current.name() {
        Some(name) => name.to_owned(),
        None => format!("{:?}", current.id()),
    }
}

/// Plain read of the counter, absent counts as 0
pub(crate) fn read_counter(store: &dyn KeyValueStore, product: &ProductId) -> Result<i64> {
    Ok(store.get_counter(&keys::counter_key(product))?.unwrap_or(0))
}

/// The unprotected critical section: two separate store calls.
///
/// Lock-based guards call this while holding their lock.
pub(crate) fn read_validate_apply(
    store: &dyn KeyValueStore,
    product: &ProductId,
    validate: Validate<'_>,
) -> Result<i64> {
    let key = keys::counter_key(product);
    let current = store.get_counter(&key)?.unwrap_or(0);
    tracing::debug!(product_id = %product, current, worker = %worker(), "stock read");

    let delta = validate(current)?;
    let value = if delta < 0 {
        store.decr_by(&key, delta.saturating_neg())?
    } else {
        store.incr_by(&key, delta)?
    };
    tracing::info!(product_id = %product, delta, result = value, worker = %worker(), "stock updated");
    Ok(value)
}

/// No protection at all
pub struct Unguarded {
    store: Arc<dyn KeyValueStore>,
}

impl Unguarded {
    /// Create an unguarded strategy over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl StockGuard for Unguarded {
    fn kind(&self) -> GuardKind {
        GuardKind::None
    }

    fn run(&self, product: &ProductId, validate: Validate<'_>) -> Result<i64> {
        read_validate_apply(&*self.store, product, validate)
    }

    fn observe(&self, product: &ProductId) -> Result<i64> {
        read_counter(&*self.store, product)
    }
}

/// One instance of every guard variant over a shared store
///
/// Local guards keep their lock tables here, so every caller that should be
/// serialized must go through the same `Guards`.
pub struct Guards {
    unguarded: Unguarded,
    exclusive: LocalExclusiveGuard,
    read_write: LocalReadWriteGuard,
    distributed: DistributedGuard,
    optimistic: OptimisticGuard,
}

impl Guards {
    /// Build every guard variant from shared lock settings
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &LockSettings) -> Self {
        let lock = DistributedLock::new(Arc::clone(&store), settings);
        Self {
            unguarded: Unguarded::new(Arc::clone(&store)),
            exclusive: LocalExclusiveGuard::new(Arc::clone(&store), settings.wait),
            read_write: LocalReadWriteGuard::new(Arc::clone(&store), settings.wait),
            distributed: DistributedGuard::new(Arc::clone(&store), lock, settings.wait),
            optimistic: OptimisticGuard::new(store),
        }
    }

    /// Guard of the requested kind
    pub fn get(&self, kind: GuardKind) -> &dyn StockGuard {
        match kind {
            GuardKind::None => &self.unguarded,
            GuardKind::LocalExclusive => &self.exclusive,
            GuardKind::LocalReadWrite => &self.read_write,
            GuardKind::Distributed => &self.distributed,
            GuardKind::Optimistic => &self.optimistic,
        }
    }

    /// The distributed lock behind the `Distributed` guard
    pub fn distributed_lock(&self) -> &DistributedLock {
        self.distributed.lock()
    }
}
