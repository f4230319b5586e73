//! Decrement flow tests

use crate::*;

#[test]
fn test_sale_reduces_remaining_stock() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let p = product();
    inventory.seed_stock(&p, 10000).unwrap();

    assert_eq!(inventory.decrement_stock(&p, 10).unwrap(), 9990);
    assert_eq!(inventory.stock_level(&p).unwrap(), 9990);
}

#[test]
fn test_oversized_sale_is_rejected_without_mutation() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let p = product();
    inventory.seed_stock(&p, 10000).unwrap();
    inventory.decrement_stock(&p, 10).unwrap();

    let err = inventory.decrement_stock(&p, 10001).unwrap_err();
    assert!(matches!(
        err,
        Error::SaleExceedsRemaining {
            current: 9990,
            requested: 10001,
            ..
        }
    ));
    assert!(!err.mutation_applied());
    assert_eq!(inventory.stock_level(&p).unwrap(), 9990);
}

#[test]
fn test_last_unit_is_not_sold() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let p = product();
    inventory.seed_stock(&p, 5).unwrap();

    assert!(inventory.decrement_stock(&p, 5).unwrap_err().is_rejection());
    assert_eq!(inventory.decrement_stock(&p, 4).unwrap(), 1);
    assert!(inventory.decrement_stock(&p, 1).unwrap_err().is_rejection());
}

#[test]
fn test_empty_counter_is_insufficient() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let err = inventory.decrement_stock(&product(), 1).unwrap_err();
    assert!(matches!(err, Error::InsufficientStock { current: 0, limit: 0, .. }));
}

#[test]
fn test_guarded_decrements_never_go_negative() {
    for guard in [GuardKind::LocalExclusive, GuardKind::LocalReadWrite] {
        let config = InventoryConfig {
            guard,
            lock: LockSettings {
                wait: Duration::from_secs(30),
                ..LockSettings::default()
            },
            ..InventoryConfig::default()
        };
        let (_store, inventory) = create_inventory_with(Arc::new(MemoryStore::new()), config);
        let inventory = Arc::new(inventory);
        inventory.seed_stock(&product(), 101).unwrap();

        let results = {
            let inventory = Arc::clone(&inventory);
            run_concurrently(30, move |_| inventory.decrement_stock(&product(), 10))
        };
        let outcomes = Outcomes::tally(&results);
        assert_eq!(outcomes.ok, 10, "guard {guard}");
        assert_eq!(outcomes.rejected, 20, "guard {guard}");
        assert_eq!(inventory.stock_level(&product()).unwrap(), 1);
    }
}

/// Without a guard, concurrent sales that all saw enough stock drive the
/// counter below zero. Each of them reports an applied overdraft, and putting
/// back exactly those sales leaves the counter non-negative.
#[test]
fn test_unguarded_decrements_can_overdraw() {
    const WORKERS: usize = 50;
    const BUY: i64 = 10;
    let stock = 100;
    let p = product();

    let mut overdrawn = false;
    for _round in 0..20 {
        let store = Arc::new(MemoryStore::with_latency(Duration::from_micros(500)));
        let (_store, inventory) = create_inventory_with(store, InventoryConfig::default());
        let inventory = Arc::new(inventory);
        inventory.seed_stock(&p, stock).unwrap();

        let results = {
            let inventory = Arc::clone(&inventory);
            run_concurrently(WORKERS, move |_| inventory.decrement_stock(&product(), BUY))
        };
        let final_value = inventory.stock_level(&p).unwrap();
        let outcomes = Outcomes::tally(&results);
        if final_value >= 0 {
            assert_eq!(outcomes.overdrafts, 0);
            continue;
        }

        overdrawn = true;
        assert!(outcomes.overdrafts > 0, "{outcomes:?}");
        let mut compensated = final_value;
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            if let Error::OverdraftOccurred { value, delta, .. } = err {
                assert!(err.mutation_applied());
                assert!(*value < 0);
                assert_eq!(*delta, -BUY);
                compensated = inventory.restock(&p, -delta).unwrap();
            }
        }
        assert_eq!(compensated, stock - outcomes.ok as i64 * BUY);
        assert!(inventory.stock_level(&p).unwrap() >= 0);
        break;
    }
    assert!(overdrawn, "no overdraft observed in 20 rounds");
}

#[test]
fn test_restock_compensates_sale() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let p = product();
    inventory.seed_stock(&p, 100).unwrap();
    inventory.decrement_stock(&p, 30).unwrap();
    assert_eq!(inventory.restock(&p, 30).unwrap(), 100);
}
