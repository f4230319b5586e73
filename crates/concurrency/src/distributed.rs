//! Distributed lock backed by set-if-absent with expiry
//!
//! The lock key is `PRODUCT:LOCK:<productId>`. Acquisition is one conditional
//! set with a fixed TTL, so a crashed holder blocks others for at most the
//! TTL. Two ownership modes exist:
//!
//! - `HolderToken`: the value is a fresh v4 UUID per acquisition and release
//!   is compare-and-delete, so a holder whose lease expired cannot delete a
//!   lock that someone else has since taken.
//! - `SharedFlag`: the value is `"true"` and release is a blind delete. Any
//!   caller can release any lock. Kept for compatibility with existing key
//!   layouts.
//!
//! `SingleShot` acquisition ignores the caller's timeout and makes exactly
//! one attempt. `BoundedPoll` keeps retrying until the timeout runs out.

use crate::guard::{read_counter, read_validate_apply, worker, GuardKind, StockGuard, Validate};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stockguard_core::duration_ms;
use stockguard_core::error::{Error, Result};
use stockguard_core::keys;
use stockguard_core::traits::KeyValueStore;
use stockguard_core::types::ProductId;
use uuid::Uuid;

/// Expiry of a lock key when not configured
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(1);

/// Wait budget for guards when not configured
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(500);

/// Lock value under `SharedFlag` ownership
pub const SHARED_LOCK_VALUE: &str = "true";

/// How a lock key records its holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOwnership {
    /// Random token per acquisition, compare-and-delete on release
    #[default]
    HolderToken,
    /// Constant `"true"`, blind delete on release
    SharedFlag,
}

/// How hard `acquire` tries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AcquireMode {
    /// One conditional set, timeout ignored
    #[default]
    SingleShot,
    /// Retry every `interval` until the timeout elapses
    BoundedPoll {
        /// Pause between attempts
        #[serde(with = "duration_ms")]
        interval: Duration,
    },
}

/// Lock parameters shared by every guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Wait budget for local guards, and for `BoundedPoll`
    #[serde(rename = "lock_wait", with = "duration_ms")]
    pub wait: Duration,
    /// Expiry of the distributed lock key
    #[serde(rename = "lock_ttl", with = "duration_ms")]
    pub ttl: Duration,
    /// Acquisition strategy of the distributed lock
    #[serde(rename = "lock_acquire")]
    pub acquire: AcquireMode,
    /// Ownership mode of the distributed lock
    #[serde(rename = "lock_ownership")]
    pub ownership: LockOwnership,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            wait: DEFAULT_LOCK_WAIT,
            ttl: DEFAULT_LOCK_TTL,
            acquire: AcquireMode::SingleShot,
            ownership: LockOwnership::HolderToken,
        }
    }
}

/// A successful acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    key: String,
    token: String,
    acquired_at: Instant,
    ttl: Duration,
}

impl LockLease {
    /// Store key of the lock
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value written to the lock key
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Time left before the store expires the key
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.acquired_at.elapsed())
    }

    /// Whether the key has (most likely) expired already
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Mutual exclusion through a lock key in the store
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    ownership: LockOwnership,
    acquire: AcquireMode,
    // Leases taken through `try_lock`, so `try_unlock` can present the token
    held: DashMap<ProductId, LockLease>,
}

impl DistributedLock {
    /// Create a lock over `store`
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &LockSettings) -> Self {
        Self {
            store,
            ttl: settings.ttl,
            ownership: settings.ownership,
            acquire: settings.acquire,
            held: DashMap::new(),
        }
    }

    /// Key expiry
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Ownership mode
    pub fn ownership(&self) -> LockOwnership {
        self.ownership
    }

    fn next_token(&self) -> String {
        match self.ownership {
            LockOwnership::HolderToken => Uuid::new_v4().to_string(),
            LockOwnership::SharedFlag => SHARED_LOCK_VALUE.to_owned(),
        }
    }

    /// Try to take the lock for `product`.
    ///
    /// Returns `Ok(None)` when someone else holds it. Store failures are
    /// returned as errors; callers treat them as not acquired.
    pub fn acquire(&self, product: &ProductId, timeout: Duration) -> Result<Option<LockLease>> {
        let key = keys::lock_key(product);
        let token = self.next_token();
        // None when the timeout runs past the end of the clock: poll forever
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if self.store.set_if_absent(&key, &token, self.ttl)? {
                tracing::debug!(product_id = %product, worker = %worker(), "distributed lock acquired");
                return Ok(Some(LockLease {
                    key,
                    token,
                    acquired_at: Instant::now(),
                    ttl: self.ttl,
                }));
            }

            match self.acquire {
                AcquireMode::SingleShot => return Ok(None),
                AcquireMode::BoundedPoll { interval } => {
                    let now = Instant::now();
                    let pause = match deadline {
                        Some(deadline) if now >= deadline => return Ok(None),
                        Some(deadline) => interval.min(deadline - now),
                        None => interval,
                    };
                    thread::sleep(pause);
                }
            }
        }
    }

    /// Release a lease.
    ///
    /// Returns whether a key was deleted. `false` under `HolderToken` means
    /// the lease expired and the key is gone or belongs to someone else.
    pub fn release(&self, lease: &LockLease) -> Result<bool> {
        let released = match self.ownership {
            LockOwnership::HolderToken => self.store.delete_if_equals(&lease.key, &lease.token)?,
            LockOwnership::SharedFlag => self.store.delete(&lease.key)?,
        };
        if !released {
            tracing::warn!(key = %lease.key, worker = %worker(), "lock lease expired before release");
        }
        Ok(released)
    }

    /// Acquire and wrap the lease in a guard that releases on drop
    pub fn lock(&self, product: &ProductId, timeout: Duration) -> Result<Option<HeldLock<'_>>> {
        Ok(self
            .acquire(product, timeout)?
            .map(|lease| HeldLock { lock: self, lease }))
    }

    /// Take the lock for `product`; `true` iff acquired
    pub fn try_lock(&self, product: &ProductId, timeout: Duration) -> Result<bool> {
        // Leases never passed to try_unlock are dropped once the store has
        // expired their keys
        self.held.retain(|_, lease| !lease.is_expired());
        match self.acquire(product, timeout)? {
            Some(lease) => {
                self.held.insert(product.clone(), lease);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release a lock taken with `try_lock`.
    ///
    /// Under `HolderToken` only a lease held by this instance is released.
    /// Under `SharedFlag` the key is deleted regardless of who set it.
    pub fn try_unlock(&self, product: &ProductId) -> Result<bool> {
        if let Some((_, lease)) = self.held.remove(product) {
            return self.release(&lease);
        }
        match self.ownership {
            LockOwnership::HolderToken => Ok(false),
            LockOwnership::SharedFlag => self.store.delete(&keys::lock_key(product)),
        }
    }

    /// Whether the lock key for `product` currently exists
    pub fn is_locked(&self, product: &ProductId) -> Result<bool> {
        Ok(self.store.get_string(&keys::lock_key(product))?.is_some())
    }
}

/// Releases its lease when dropped
pub struct HeldLock<'a> {
    lock: &'a DistributedLock,
    lease: LockLease,
}

impl HeldLock<'_> {
    /// The underlying lease
    pub fn lease(&self) -> &LockLease {
        &self.lease
    }
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release(&self.lease) {
            tracing::error!(key = %self.lease.key, error = %e, "failed to release distributed lock");
        }
    }
}

/// Guard serializing critical sections through a `DistributedLock`
pub struct DistributedGuard {
    store: Arc<dyn KeyValueStore>,
    lock: DistributedLock,
    wait: Duration,
}

impl DistributedGuard {
    /// Create a guard using `lock` with a nominal wait of `wait`
    pub fn new(store: Arc<dyn KeyValueStore>, lock: DistributedLock, wait: Duration) -> Self {
        Self { store, lock, wait }
    }

    /// The lock used by this guard
    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }
}

impl StockGuard for DistributedGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::Distributed
    }

    fn run(&self, product: &ProductId, validate: Validate<'_>) -> Result<i64> {
        let Some(held) = self.lock.lock(product, self.wait)? else {
            tracing::warn!(product_id = %product, worker = %worker(), "distributed lock not acquired");
            return Err(Error::LockNotAcquired {
                product_id: product.to_string(),
                waited_ms: u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX),
            });
        };
        let result = read_validate_apply(&*self.store, product, validate);
        drop(held);
        result
    }

    fn observe(&self, product: &ProductId) -> Result<i64> {
        read_counter(&*self.store, product)
    }
}
