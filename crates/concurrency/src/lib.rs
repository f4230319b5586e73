//! Concurrency control for stockguard
//!
//! This crate implements the guards that make "read stock, validate, mutate"
//! behave as one step:
//! - `Unguarded`: plain read then write, races are possible
//! - `LocalExclusiveGuard`: per-product mutex inside one process
//! - `LocalReadWriteGuard`: per-product `StampedLock` inside one process
//! - `DistributedGuard`: lock key in the store (`DistributedLock`)
//! - `OptimisticGuard`: watch/multi/exec (`Transaction`)
//!
//! `RetryPolicy` adds opt-in retries of lock timeouts and conflicts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distributed;
pub mod guard;
pub mod local;
pub mod optimistic;
pub mod retry;
pub mod stamped;
pub mod transaction;

pub use distributed::{
    AcquireMode, DistributedGuard, DistributedLock, HeldLock, LockLease, LockOwnership,
    LockSettings, DEFAULT_LOCK_TTL, DEFAULT_LOCK_WAIT, SHARED_LOCK_VALUE,
};
pub use guard::{GuardKind, Guards, StockGuard, Unguarded, Validate};
pub use local::LocalExclusiveGuard;
pub use optimistic::OptimisticGuard;
pub use retry::RetryPolicy;
pub use stamped::{
    LocalReadWriteGuard, OptimisticStamp, ReadStamp, StampedLock, WriteStamp,
    WriteStampGuard,
};
pub use transaction::{Transaction, TransactionStatus};
