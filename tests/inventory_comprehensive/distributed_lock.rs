//! Distributed lock tests

use crate::*;

#[test]
fn test_lock_expires_without_unlock() {
    let config = InventoryConfig {
        lock: LockSettings {
            ownership: LockOwnership::SharedFlag,
            ..LockSettings::default()
        },
        ..InventoryConfig::default()
    };
    let (store, inventory) = create_inventory_with(Arc::new(MemoryStore::new()), config);
    let x = ProductId::new("X").unwrap();

    assert!(inventory.try_lock(&x, Duration::from_millis(500)).unwrap());
    assert_eq!(
        store.get_string("PRODUCT:LOCK:X").unwrap().as_deref(),
        Some("true")
    );
    let ttl = store.ttl("PRODUCT:LOCK:X").unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(1));
    assert!(!inventory.try_lock(&x, Duration::from_millis(500)).unwrap());

    thread::sleep(Duration::from_millis(1100));
    assert!(inventory.try_lock(&x, Duration::from_millis(500)).unwrap());
}

#[test]
fn test_shared_flag_lets_anyone_unlock() {
    let settings = LockSettings {
        ownership: LockOwnership::SharedFlag,
        ..LockSettings::default()
    };
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let first = DistributedLock::new(store.clone(), &settings);
    let second = DistributedLock::new(store.clone(), &settings);

    assert!(first.try_lock(&product(), Duration::ZERO).unwrap());
    assert!(second.try_unlock(&product()).unwrap());
    assert!(second.try_lock(&product(), Duration::ZERO).unwrap());
}

#[test]
fn test_holder_token_protects_against_foreign_unlock() {
    let settings = LockSettings::default();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let first = DistributedLock::new(store.clone(), &settings);
    let second = DistributedLock::new(store.clone(), &settings);

    assert!(first.try_lock(&product(), Duration::ZERO).unwrap());
    assert!(!second.try_unlock(&product()).unwrap());
    assert!(first.is_locked(&product()).unwrap());
    assert!(first.try_unlock(&product()).unwrap());
}

#[test]
fn test_store_outage_is_an_error_not_a_lock() {
    let (store, inventory) = create_inventory(GuardKind::Distributed);
    store.set_available(false);

    assert!(matches!(
        inventory.try_lock(&product(), Duration::ZERO),
        Err(Error::StoreUnavailable(_))
    ));
    assert!(matches!(
        inventory.increment_sold(&product(), 10, 1),
        Err(Error::StoreUnavailable(_))
    ));

    store.set_available(true);
    assert_eq!(inventory.increment_sold(&product(), 10, 1).unwrap(), 1);
}

#[test]
fn test_guarded_sale_releases_lock() {
    let (_store, inventory) = create_inventory(GuardKind::Distributed);
    inventory.increment_sold(&product(), 10, 5).unwrap();
    assert!(!inventory.distributed_lock().is_locked(&product()).unwrap());
    inventory.increment_sold(&product(), 10, 6).unwrap_err();
    assert!(!inventory.distributed_lock().is_locked(&product()).unwrap());
}
