//! Optimistic guard tests

use crate::*;

#[test]
fn test_interleaved_write_aborts_whole_transaction() {
    let (store, _inventory) = create_inventory(GuardKind::Optimistic);
    let key = keys::counter_key(&product());
    let set_key = keys::order_set_key(&product());
    store.incr_by(&key, 10).unwrap();

    let mut txn = Transaction::begin(&*store);
    txn.watch(&key).unwrap();
    assert_eq!(txn.get_counter(&key).unwrap(), Some(10));
    txn.incr_by(&key, 5).unwrap();
    txn.set_add(&set_key, "A-1").unwrap();

    // another writer gets in between
    store.incr_by(&key, 1).unwrap();

    let err = txn.exec().unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(store.get_counter(&key).unwrap(), Some(11));
    assert_eq!(store.set_cardinality(&set_key).unwrap(), 0);
}

#[test]
fn test_concurrent_commits_match_final_value() {
    let (_store, inventory) =
        create_inventory_with(Arc::new(MemoryStore::with_latency(Duration::from_micros(300))), InventoryConfig {
            guard: GuardKind::Optimistic,
            ..InventoryConfig::default()
        });
    let inventory = Arc::new(inventory);
    let total = 100;

    let results = {
        let inventory = Arc::clone(&inventory);
        run_concurrently(40, move |_| inventory.increment_sold(&product(), total, 10))
    };
    let outcomes = Outcomes::tally(&results);
    let final_value = inventory.stock_level(&product()).unwrap();

    assert_eq!(outcomes.overdrafts, 0);
    assert_eq!(outcomes.lock_not_acquired, 0);
    assert_eq!(outcomes.ok + outcomes.conflicts + outcomes.rejected, 40);
    assert_eq!(final_value, outcomes.ok as i64 * 10);
    assert!(final_value <= total);
}

/// Capacity for M = 10 sales among N = 40 callers
#[test]
fn test_retry_yields_exactly_capacity_commits() {
    let config = InventoryConfig {
        guard: GuardKind::Optimistic,
        retry: RetryPolicy::with_attempts(100_000)
            .backoff(Duration::from_micros(50), Duration::from_millis(1)),
        ..InventoryConfig::default()
    };
    let (_store, inventory) = create_inventory_with(
        Arc::new(MemoryStore::with_latency(Duration::from_micros(100))),
        config,
    );
    let inventory = Arc::new(inventory);

    let results = {
        let inventory = Arc::clone(&inventory);
        run_concurrently(40, move |_| inventory.increment_sold(&product(), 100, 10))
    };
    let outcomes = Outcomes::tally(&results);

    assert_eq!(outcomes.ok, 10, "{outcomes:?}");
    assert_eq!(outcomes.rejected, 30);
    assert_eq!(outcomes.conflicts, 0);
    assert_eq!(inventory.stock_level(&product()).unwrap(), 100);
}

#[test]
fn test_conflicts_without_retry_write_nothing() {
    let (store, inventory) = create_inventory(GuardKind::Optimistic);
    let inventory = Arc::new(inventory);
    store.set_latency(Duration::from_micros(500));

    let results = {
        let inventory = Arc::clone(&inventory);
        run_concurrently(20, move |_| inventory.increment_sold(&product(), 1000, 1))
    };
    let outcomes = Outcomes::tally(&results);

    assert!(outcomes.ok >= 1);
    assert_eq!(outcomes.ok + outcomes.conflicts, 20);
    assert_eq!(inventory.stock_level(&product()).unwrap(), outcomes.ok as i64);
}
