//! Stamped read/write lock and the guard built on it
//!
//! `StampedLock` hands out stamps instead of borrow guards so that the
//! release can be checked: `unlock_write` with a stamp that does not belong
//! to the current writer is an error. It also offers optimistic reads, where
//! a reader takes a stamp without blocking writers and later validates that
//! no write happened in between.
//!
//! The sequence number is odd while a writer holds the lock and is bumped on
//! every write acquire and release.

use crate::guard::{read_counter, read_validate_apply, worker, GuardKind, StockGuard, Validate};
use crate::local::LockTable;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stockguard_core::error::{Error, Result};
use stockguard_core::traits::KeyValueStore;
use stockguard_core::types::ProductId;

/// Proof of holding the write lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStamp(u64);

/// Proof of holding a read lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadStamp(u64);

/// Sequence observed by an optimistic reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticStamp(u64);

impl WriteStamp {
    /// Raw sequence number
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct StampState {
    sequence: u64,
    writer: Option<u64>,
    readers: usize,
}

/// Read/write lock with checkable release stamps and optimistic reads
#[derive(Debug, Default)]
pub struct StampedLock {
    state: Mutex<StampState>,
    released: Condvar,
}

impl StampedLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self::default()
    }

    // Returns whether the wait timed out; no deadline waits until notified
    fn wait_released(
        &self,
        state: &mut MutexGuard<'_, StampState>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => self.released.wait_until(state, deadline).timed_out(),
            None => {
                self.released.wait(state);
                false
            }
        }
    }

    /// Acquire the write lock, waiting at most `timeout`
    pub fn try_write_lock(&self, timeout: Duration) -> Option<WriteStamp> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while state.writer.is_some() || state.readers > 0 {
            if self.wait_released(&mut state, deadline)
                && (state.writer.is_some() || state.readers > 0)
            {
                return None;
            }
        }
        state.sequence += 1;
        state.writer = Some(state.sequence);
        Some(WriteStamp(state.sequence))
    }

    /// Release the write lock held under `stamp`
    pub fn unlock_write(&self, stamp: WriteStamp) -> Result<()> {
        let mut state = self.state.lock();
        if state.writer != Some(stamp.0) {
            return Err(Error::Internal(format!(
                "unlock_write with stamp {} but writer is {:?}",
                stamp.0, state.writer
            )));
        }
        state.writer = None;
        state.sequence += 1;
        drop(state);
        self.released.notify_all();
        Ok(())
    }

    /// Acquire a shared read lock, waiting at most `timeout`
    pub fn try_read_lock(&self, timeout: Duration) -> Option<ReadStamp> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while state.writer.is_some() {
            if self.wait_released(&mut state, deadline) && state.writer.is_some() {
                return None;
            }
        }
        state.readers += 1;
        Some(ReadStamp(state.sequence))
    }

    /// Release a read lock
    pub fn unlock_read(&self, stamp: ReadStamp) -> Result<()> {
        let mut state = self.state.lock();
        if state.readers == 0 || state.writer.is_some() {
            return Err(Error::Internal(format!(
                "unlock_read with stamp {} but no read lock is held",
                stamp.0
            )));
        }
        state.readers -= 1;
        let last = state.readers == 0;
        drop(state);
        if last {
            self.released.notify_all();
        }
        Ok(())
    }

    /// Stamp for an optimistic read, `None` while a writer holds the lock
    pub fn try_optimistic_read(&self) -> Option<OptimisticStamp> {
        let state = self.state.lock();
        match state.writer {
            Some(_) => None,
            None => Some(OptimisticStamp(state.sequence)),
        }
    }

    /// Whether no write lock was taken since `stamp` was issued
    pub fn validate(&self, stamp: OptimisticStamp) -> bool {
        self.state.lock().sequence == stamp.0
    }

    /// Whether a writer currently holds the lock
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    /// Acquire the write lock and release it when the returned guard drops
    pub fn write_guard(&self, timeout: Duration) -> Option<WriteStampGuard<'_>> {
        self.try_write_lock(timeout)
            .map(|stamp| WriteStampGuard { lock: self, stamp })
    }
}

/// Releases its write stamp on drop
pub struct WriteStampGuard<'a> {
    lock: &'a StampedLock,
    stamp: WriteStamp,
}

impl WriteStampGuard<'_> {
    /// Stamp held by this guard
    pub fn stamp(&self) -> WriteStamp {
        self.stamp
    }
}

impl Drop for WriteStampGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock_write(self.stamp) {
            tracing::error!(error = %e, "failed to release write stamp");
        }
    }
}

/// In-process guard taking a per-product stamped write lock
pub struct LocalReadWriteGuard {
    store: Arc<dyn KeyValueStore>,
    locks: LockTable<StampedLock>,
    wait: Duration,
}

impl LocalReadWriteGuard {
    /// Create a guard that waits at most `wait` for the write lock
    pub fn new(store: Arc<dyn KeyValueStore>, wait: Duration) -> Self {
        Self {
            store,
            locks: LockTable::new(),
            wait,
        }
    }

    /// Lock backing `product`
    pub fn lock_for(&self, product: &ProductId) -> Arc<StampedLock> {
        self.locks.get(product)
    }
}

impl StockGuard for LocalReadWriteGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::LocalReadWrite
    }

    fn run(&self, product: &ProductId, validate: Validate<'_>) -> Result<i64> {
        let lock = self.locks.get(product);
        let Some(held) = lock.write_guard(self.wait) else {
            tracing::warn!(product_id = %product, worker = %worker(), "write stamp not acquired");
            return Err(Error::LockNotAcquired {
                product_id: product.to_string(),
                waited_ms: u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX),
            });
        };
        tracing::debug!(product_id = %product, write_stamp = held.stamp().value(), worker = %worker(), "write stamp acquired");
        read_validate_apply(&*self.store, product, validate)
    }

    /// Optimistic read validated against guarded writers, falling back to a
    /// read lock when a write intervened
    fn observe(&self, product: &ProductId) -> Result<i64> {
        let lock = self.locks.get(product);
        if let Some(stamp) = lock.try_optimistic_read() {
            let value = read_counter(&*self.store, product)?;
            if lock.validate(stamp) {
                return Ok(value);
            }
        }

        let Some(stamp) = lock.try_read_lock(self.wait) else {
            return Err(Error::LockNotAcquired {
                product_id: product.to_string(),
                waited_ms: u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX),
            });
        };
        let value = read_counter(&*self.store, product);
        lock.unlock_read(stamp)?;
        value
    }
}
