//! The key-value store capability consumed by every guard and operation.
//!
//! [`KeyValueStore`] is the seam between inventory logic and whatever store
//! holds the counters. Each method is expected to be atomic on its single key.
//! Multi-key atomicity is only available through [`KeyValueStore::exec`].

use crate::error::Result;
use smallvec::SmallVec;
use std::time::Duration;

/// Opaque modification marker of one key
///
/// `None` inside means the key was absent when watched. Any write to the key
/// produces a different marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchVersion(pub Option<u64>);

impl WatchVersion {
    /// Marker of an absent key
    pub const ABSENT: WatchVersion = WatchVersion(None);

    /// Whether the key was absent when watched
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

/// A mutation queued inside a transaction block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add `delta` to the integer at `key` (creating it at 0)
    IncrBy {
        /// Counter key
        key: String,
        /// Signed delta
        delta: i64,
    },
    /// Add `member` to the set at `key`
    SetAdd {
        /// Set key
        key: String,
        /// Member to add
        member: String,
    },
}

impl Command {
    /// Key this command writes
    pub fn key(&self) -> &str {
        match self {
            Command::IncrBy { key, .. } | Command::SetAdd { key, .. } => key,
        }
    }
}

/// Queued commands of one transaction; most carry a single mutation
pub type CommandBatch = SmallVec<[Command; 2]>;

/// Keys observed by a transaction together with the marker seen at watch time
pub type WatchSet = SmallVec<[(String, WatchVersion); 2]>;

/// Atomic single-key operations plus a watch/multi/exec block.
///
/// Implementations must be shareable across threads. Transport failures are
/// reported as [`crate::Error::StoreUnavailable`].
pub trait KeyValueStore: Send + Sync {
    /// Read an integer counter. `None` if the key does not exist.
    fn get_counter(&self, key: &str) -> Result<Option<i64>>;

    /// Read a string value. Integer values are rendered in decimal.
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Atomically add `delta` and return the new value.
    ///
    /// A missing key starts at 0.
    fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Atomically subtract `delta` and return the new value.
    fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let negated = delta.checked_neg().ok_or_else(|| {
            crate::Error::InvalidInput(format!("decrement {delta} overflows"))
        })?;
        self.incr_by(key, negated)
    }

    /// Set `key` to `value` with an expiry, only if the key is absent.
    ///
    /// Returns `true` iff the key was written.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete a key. Returns `true` if it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Delete `key` only if it currently holds exactly `expected`.
    ///
    /// Check and delete happen as one atomic step.
    fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool>;

    /// Set a time-to-live on an existing key. Returns `false` if absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining time-to-live. `None` if the key is absent or never expires.
    fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Add a member to a set. Returns `true` if it was not already present.
    fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set. Returns `true` if it was present.
    fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// Number of members in a set (0 if absent).
    fn set_cardinality(&self, key: &str) -> Result<u64>;

    /// Whether `member` is in the set.
    fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// Mark a key as watched and return its current marker.
    fn watch(&self, key: &str) -> Result<WatchVersion>;

    /// Commit a transaction block.
    ///
    /// If any watched key no longer carries its recorded marker, nothing is
    /// applied and `Ok(None)` is returned. Otherwise every command is applied
    /// atomically and the per-command results are returned (new counter value
    /// for `IncrBy`, 1/0 for `SetAdd`).
    fn exec(&self, watched: &[(String, WatchVersion)], commands: &[Command])
        -> Result<Option<Vec<i64>>>;
}
