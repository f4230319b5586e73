//! Inventory Comprehensive Test Suite
//!
//! End-to-end tests of the inventory flows against `MemoryStore`.
//!
//! ## Key Verification Points
//!
//! 1. Decrement, increment and order-set flows accept and reject as documented
//! 2. Unguarded increments can overshoot the cap under concurrency
//! 3. Lock-based guards never overshoot and land exactly on the cap
//! 4. Optimistic commits either apply fully or not at all
//! 5. Distributed lock keys expire
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test inventory_comprehensive
//!
//! # Run the race tests only
//! cargo test --test inventory_comprehensive races::
//! ```

pub use std::sync::{Arc, Barrier};
pub use std::thread;

use once_cell::sync::Lazy;
pub use stockguard::prelude::*;
pub use stockguard::{keys, DistributedLock, LockSettings, Transaction};

// Test modules
pub mod decrement;
pub mod distributed_lock;
pub mod increment;
pub mod optimistic;
pub mod races;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::WARN)
        .try_init();
});

/// Install the test subscriber once per test binary
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Product id used by most tests
pub fn product() -> ProductId {
    ProductId::new("11002").unwrap()
}

/// Create a store and an inventory using `guard` by default
pub fn create_inventory(guard: GuardKind) -> (Arc<MemoryStore>, Inventory) {
    let config = InventoryConfig {
        guard,
        ..InventoryConfig::default()
    };
    create_inventory_with(Arc::new(MemoryStore::new()), config)
}

/// Create an inventory over an existing store
pub fn create_inventory_with(
    store: Arc<MemoryStore>,
    config: InventoryConfig,
) -> (Arc<MemoryStore>, Inventory) {
    init_tracing();
    let inventory = Inventory::builder()
        .store(store.clone())
        .config(config)
        .build()
        .unwrap();
    (store, inventory)
}

/// Run `f(i)` on `n` threads released together by a barrier
pub fn run_concurrently<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let f = Arc::clone(&f);
            let barrier = Arc::clone(&barrier);
            thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || {
                    barrier.wait();
                    f(i)
                })
                .unwrap()
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Tally of concurrent call outcomes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcomes {
    pub ok: usize,
    pub rejected: usize,
    pub lock_not_acquired: usize,
    pub conflicts: usize,
    pub overdrafts: usize,
}

impl Outcomes {
    pub fn tally(results: &[Result<i64>]) -> Self {
        let mut outcomes = Outcomes::default();
        for result in results {
            match result {
                Ok(_) => outcomes.ok += 1,
                Err(e) if e.is_rejection() => outcomes.rejected += 1,
                Err(Error::LockNotAcquired { .. }) => outcomes.lock_not_acquired += 1,
                Err(Error::TransactionConflict { .. }) => outcomes.conflicts += 1,
                Err(Error::OverdraftOccurred { .. }) => outcomes.overdrafts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        outcomes
    }
}
