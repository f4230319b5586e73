//! Increment flow tests

use crate::*;

#[test]
fn test_first_sale_under_cap() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    assert_eq!(inventory.increment_sold(&product(), 10000, 10).unwrap(), 10);
}

#[test]
fn test_sale_larger_than_cap_is_rejected() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let p = product();
    let err = inventory.increment_sold(&p, 10, 11).unwrap_err();
    assert!(matches!(
        err,
        Error::SaleExceedsRemaining {
            current: 0,
            requested: 11,
            limit: 10,
            ..
        }
    ));
    assert_eq!(inventory.stock_level(&p).unwrap(), 0);
}

#[test]
fn test_sold_out_is_insufficient() {
    for guard in GuardKind::ALL {
        let (_store, inventory) = create_inventory(guard);
        let p = product();
        assert_eq!(inventory.increment_sold(&p, 30, 30).unwrap(), 30);
        let err = inventory.increment_sold(&p, 30, 1).unwrap_err();
        assert!(
            matches!(err, Error::InsufficientStock { current: 30, limit: 30, .. }),
            "guard {guard}: {err}"
        );
    }
}

#[test]
fn test_zero_cap_sells_nothing() {
    let (_store, inventory) = create_inventory(GuardKind::LocalExclusive);
    let err = inventory.increment_sold(&product(), 0, 1).unwrap_err();
    assert!(matches!(err, Error::InsufficientStock { .. }));
}

#[test]
fn test_per_call_guard_overrides_default() {
    let (_store, inventory) = create_inventory(GuardKind::None);
    let p = product();
    for (i, guard) in GuardKind::ALL.into_iter().enumerate() {
        let expected = 10 * (i as i64 + 1);
        assert_eq!(inventory.increment_sold_with(guard, &p, 1000, 10).unwrap(), expected);
    }
}

#[test]
fn test_refund_reverses_sale() {
    let (_store, inventory) = create_inventory(GuardKind::LocalReadWrite);
    let p = product();
    inventory.increment_sold(&p, 100, 40).unwrap();
    assert_eq!(inventory.refund_sold(&p, 15).unwrap(), 25);
    assert!(inventory.refund_sold(&p, 26).unwrap_err().is_rejection());
    assert_eq!(inventory.stock_level(&p).unwrap(), 25);
}

#[test]
fn test_products_are_independent() {
    let (_store, inventory) = create_inventory(GuardKind::Distributed);
    let a = ProductId::new("A").unwrap();
    let b = ProductId::new("B").unwrap();
    inventory.increment_sold(&a, 10, 10).unwrap();
    assert_eq!(inventory.increment_sold(&b, 10, 5).unwrap(), 5);
    assert!(inventory.increment_sold(&a, 10, 1).is_err());
}

#[test]
fn test_counter_key_layout() {
    let (store, inventory) = create_inventory(GuardKind::None);
    inventory.increment_sold(&product(), 100, 7).unwrap();
    assert_eq!(store.get_counter("PRODUCT:STOCKED:11002").unwrap(), Some(7));
}
