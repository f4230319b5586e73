//! Public types for the Stockguard API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Identifiers and key layout
pub use stockguard_core::keys;
pub use stockguard_core::{OrderId, ProductId};

// Store capability and the reference store
pub use stockguard_core::{Command, KeyValueStore, WatchVersion};
pub use stockguard_storage::MemoryStore;

// Guards
pub use stockguard_concurrency::{
    AcquireMode, DistributedLock, GuardKind, Guards, LockLease, LockOwnership, LockSettings,
    StampedLock, StockGuard, Transaction, TransactionStatus,
};

// Retry
pub use stockguard_concurrency::RetryPolicy;
