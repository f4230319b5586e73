//! Race exposure and race prevention under concurrent increments
//!
//! Every store call sleeps a little so the gap between the read and the
//! increment is wide enough to be hit.

use crate::*;

const WORKERS: usize = 50;
const BUY: i64 = 10;

fn slow_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_latency(Duration::from_micros(500)))
}

fn concurrent_increments(inventory: &Arc<Inventory>, total: i64) -> Vec<Result<i64>> {
    let inventory = Arc::clone(inventory);
    run_concurrently(WORKERS, move |_| inventory.increment_sold(&product(), total, BUY))
}

#[test]
fn test_unguarded_increments_can_overshoot() {
    let total = 100;
    let mut overshoots = 0;
    for _round in 0..20 {
        let (_store, inventory) = create_inventory_with(slow_store(), InventoryConfig::default());
        let inventory = Arc::new(inventory);
        let results = concurrent_increments(&inventory, total);

        let final_value = inventory.stock_level(&product()).unwrap();
        let outcomes = Outcomes::tally(&results);
        if final_value > total {
            overshoots += 1;
            assert!(outcomes.overdrafts > 0);
            assert!(results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .any(|e| e.requires_compensation()));
        }
        if overshoots > 0 {
            break;
        }
    }
    assert!(overshoots > 0, "no overshoot observed in 20 rounds");
}

fn assert_exact_cap(config: InventoryConfig) {
    let total = WORKERS as i64 * BUY;
    let (_store, inventory) = create_inventory_with(slow_store(), config);
    let inventory = Arc::new(inventory);

    let results = concurrent_increments(&inventory, total);
    let outcomes = Outcomes::tally(&results);

    assert_eq!(outcomes.ok, WORKERS, "guard {}: {outcomes:?}", config.guard);
    assert_eq!(outcomes.overdrafts, 0);
    assert_eq!(inventory.stock_level(&product()).unwrap(), total);
}

fn patient_lock() -> LockSettings {
    LockSettings {
        wait: Duration::from_secs(60),
        ..LockSettings::default()
    }
}

#[test]
fn test_local_exclusive_lands_exactly_on_cap() {
    assert_exact_cap(InventoryConfig {
        guard: GuardKind::LocalExclusive,
        lock: patient_lock(),
        ..InventoryConfig::default()
    });
}

#[test]
fn test_local_read_write_lands_exactly_on_cap() {
    assert_exact_cap(InventoryConfig {
        guard: GuardKind::LocalReadWrite,
        lock: patient_lock(),
        ..InventoryConfig::default()
    });
}

#[test]
fn test_distributed_with_bounded_poll_lands_exactly_on_cap() {
    assert_exact_cap(InventoryConfig {
        guard: GuardKind::Distributed,
        lock: LockSettings {
            acquire: AcquireMode::BoundedPoll {
                interval: Duration::from_millis(1),
            },
            ..patient_lock()
        },
        ..InventoryConfig::default()
    });
}

#[test]
fn test_distributed_with_retry_lands_exactly_on_cap() {
    assert_exact_cap(InventoryConfig {
        guard: GuardKind::Distributed,
        retry: RetryPolicy::with_attempts(100_000)
            .backoff(Duration::from_micros(100), Duration::from_millis(2)),
        ..InventoryConfig::default()
    });
}

#[test]
fn test_single_shot_distributed_never_overshoots() {
    let total = 100;
    let config = InventoryConfig {
        guard: GuardKind::Distributed,
        ..InventoryConfig::default()
    };
    let (_store, inventory) = create_inventory_with(slow_store(), config);
    let inventory = Arc::new(inventory);

    let results = concurrent_increments(&inventory, total);
    let outcomes = Outcomes::tally(&results);
    let final_value = inventory.stock_level(&product()).unwrap();

    assert_eq!(outcomes.overdrafts, 0);
    assert!(outcomes.lock_not_acquired > 0, "{outcomes:?}");
    assert_eq!(final_value, outcomes.ok as i64 * BUY);
    assert!(final_value <= total);
}

/// 200 workers, cap 1000, 10 per sale: exactly 100 sales go through.
#[test]
fn test_two_hundred_workers_distributed_lock() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let inventory = Arc::new(inventory);
    let p = product();
    inventory.seed_stock(&p, 0).unwrap();

    let results = {
        let inventory = Arc::clone(&inventory);
        run_concurrently(200, move |_| {
            let mut lock_misses = 0usize;
            loop {
                match inventory.increment_sold_distributed_locked(&product(), 1000, 10) {
                    Err(Error::LockNotAcquired { .. }) => {
                        lock_misses += 1;
                        thread::yield_now();
                    }
                    other => return (other, lock_misses),
                }
            }
        })
    };

    let sales: Vec<_> = results.iter().map(|(r, _)| r.clone()).collect();
    let outcomes = Outcomes::tally(&sales);
    assert_eq!(outcomes.ok, 100);
    assert_eq!(outcomes.rejected, 100);
    assert_eq!(inventory.stock_level(&p).unwrap(), 1000);
    assert!(!inventory.distributed_lock().is_locked(&p).unwrap());

    let misses: usize = results.iter().map(|(_, m)| m).sum();
    tracing::info!(misses, "lock misses under contention");
}
