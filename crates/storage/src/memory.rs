//! In-process key-value store
//!
//! `MemoryStore` is a reference implementation of [`KeyValueStore`] with the
//! semantics inventory guards rely on: single-key atomic counters, sets,
//! expiring keys, conditional set and watch/multi/exec.
//!
//! # Design
//!
//! - DashMap: 16-way sharded by default, a write only locks the key's shard
//! - Every write stamps the entry with a fresh store-wide version, which is
//!   the marker handed out by `watch`
//! - Commit gate: single-key writers hold the read side, `exec` holds the
//!   write side, so validation and application of a transaction block cannot
//!   interleave with any other write
//! - Expiry is lazy: expired entries read as absent and are dropped by the
//!   next write or by [`MemoryStore::purge_expired`]
//!
//! # Fault injection
//!
//! - [`MemoryStore::set_available`] turns every call into `StoreUnavailable`
//! - [`MemoryStore::with_latency`] sleeps before each round-trip, which widens
//!   the window between a read and the following write

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use stockguard_core::error::{Error, Result};
use stockguard_core::traits::{Command, KeyValueStore, WatchVersion};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Stored payload
#[derive(Debug, Clone, PartialEq)]
enum Data {
    Int(i64),
    Str(String),
    Set(FxHashSet<String>),
}

impl Data {
    fn kind(&self) -> &'static str {
        match self {
            Data::Int(_) => "integer",
            Data::Str(_) => "string",
            Data::Set(_) => "set",
        }
    }

    /// Integer view; numeric strings count as integers
    fn as_int(&self, key: &str) -> Result<i64> {
        match self {
            Data::Int(v) => Ok(*v),
            Data::Str(s) => s.parse().map_err(|_| wrong_type(key, "integer", "string")),
            Data::Set(_) => Err(wrong_type(key, "integer", "set")),
        }
    }

    fn matches_str(&self, expected: &str) -> bool {
        match self {
            Data::Int(v) => v.to_string() == expected,
            Data::Str(s) => s == expected,
            Data::Set(_) => false,
        }
    }
}

/// A stored value with its modification marker and optional deadline
#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data, version: u64) -> Self {
        Self {
            data,
            version,
            expires_at: None,
        }
    }

    /// Cheap stand-in left in the map while the real entry is being mutated
    fn placeholder() -> Self {
        Self::new(Data::Int(0), 0)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

fn wrong_type(key: &str, expected: &'static str, actual: &'static str) -> Error {
    Error::WrongType {
        key: key.to_string(),
        expected,
        actual,
    }
}

fn overflow(key: &str, delta: i64) -> Error {
    Error::InvalidInput(format!("increment of {key} by {delta} would overflow"))
}

fn expiry_after(key: &str, ttl: Duration) -> Result<Instant> {
    Instant::now()
        .checked_add(ttl)
        .ok_or_else(|| Error::InvalidInput(format!("expiry for {key} is out of range: {ttl:?}")))
}

/// Sharded in-memory key-value store
///
/// # Thread Safety
///
/// All operations are thread-safe and atomic per key:
/// - Reads never take the commit gate
/// - Single-key writes lock only the target shard
/// - `exec` excludes every writer for the duration of validate + apply
///
/// # Example
///
/// ```
/// use stockguard_core::KeyValueStore;
/// use stockguard_storage::MemoryStore;
///
/// let store = MemoryStore::new();
/// assert_eq!(store.incr_by("PRODUCT:STOCKED:1", 10).unwrap(), 10);
/// assert_eq!(store.decr_by("PRODUCT:STOCKED:1", 3).unwrap(), 7);
/// ```
pub struct MemoryStore {
    entries: DashMap<String, Entry, FxBuildHasher>,
    /// Global version; each write takes the next value
    version: AtomicU64,
    /// Readers: single-key writes. Writer: `exec`.
    commit_gate: RwLock<()>,
    available: AtomicBool,
    latency_micros: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher::default()),
            version: AtomicU64::new(0),
            commit_gate: RwLock::new(()),
            available: AtomicBool::new(true),
            latency_micros: AtomicU64::new(0),
        }
    }

    /// Create an empty store that sleeps `latency` on every round-trip
    pub fn with_latency(latency: Duration) -> Self {
        let store = Self::new();
        store.set_latency(latency);
        store
    }

    /// Change the simulated round-trip latency
    pub fn set_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros.store(micros, Ordering::Relaxed);
    }

    /// Simulate the store going down (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Whether calls currently reach the store
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Get current version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Increment version and return new value
    #[inline]
    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of live (non-expired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    /// Check if the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let _gate = self.commit_gate.read();
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::debug!(purged, "purged expired keys");
        }
        purged
    }

    /// Remove every key
    pub fn clear(&self) {
        let _gate = self.commit_gate.write();
        self.entries.clear();
    }

    /// Availability check plus simulated network delay
    fn round_trip(&self) -> Result<()> {
        if !self.is_available() {
            return Err(Error::StoreUnavailable("memory store is offline".into()));
        }
        let micros = self.latency_micros.load(Ordering::Relaxed);
        if micros > 0 {
            std::thread::sleep(Duration::from_micros(micros));
        }
        Ok(())
    }

    /// Run `f` against the live entry at `key`, if any
    fn read<T>(&self, key: &str, f: impl FnOnce(&Entry) -> T) -> Option<T> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| f(entry.value()))
    }

    /// Single-key write under the read side of the commit gate
    fn mutate<T>(&self, key: &str, f: impl FnOnce(&mut Option<Entry>) -> Result<T>) -> Result<T> {
        let _gate = self.commit_gate.read();
        self.mutate_locked(key, f)
    }

    /// Single-key write; the caller holds the commit gate.
    ///
    /// `f` sees `None` for absent or expired keys. Whatever it leaves in the
    /// slot is written back; leaving `None` deletes the key. `f` must not
    /// touch the slot on its error paths.
    fn mutate_locked<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Option<Entry>) -> Result<T>,
    ) -> Result<T> {
        let now = Instant::now();
        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                let taken = std::mem::replace(occupied.get_mut(), Entry::placeholder());
                let mut slot = if taken.is_expired(now) { None } else { Some(taken) };
                let result = f(&mut slot);
                match slot {
                    Some(entry) => *occupied.get_mut() = entry,
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            MapEntry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(entry) = slot {
                    vacant.insert(entry);
                }
                result
            }
        }
    }

    fn apply_incr(&self, key: &str, delta: i64) -> Result<i64> {
        self.mutate_locked(key, |slot| {
            let current = match slot {
                Some(entry) => entry.data.as_int(key)?,
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| overflow(key, delta))?;
            let version = self.next_version();
            match slot {
                // INCR keeps an existing deadline
                Some(entry) => {
                    entry.data = Data::Int(next);
                    entry.version = version;
                }
                None => *slot = Some(Entry::new(Data::Int(next), version)),
            }
            Ok(next)
        })
    }

    fn apply_set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.mutate_locked(key, |slot| match slot {
            Some(entry) => match &mut entry.data {
                Data::Set(members) => {
                    let added = members.insert(member.to_owned());
                    if added {
                        entry.version = self.next_version();
                    }
                    Ok(added)
                }
                other => Err(wrong_type(key, "set", other.kind())),
            },
            None => {
                let mut members = FxHashSet::default();
                members.insert(member.to_owned());
                *slot = Some(Entry::new(Data::Set(members), self.next_version()));
                Ok(true)
            }
        })
    }

    /// Dry-run a command batch so that `exec` never applies half of it
    fn validate_commands(&self, commands: &[Command]) -> Result<()> {
        let mut pending: FxHashMap<&str, i64> = FxHashMap::default();
        for command in commands {
            match command {
                Command::IncrBy { key, delta } => {
                    let base = match pending.get(key.as_str()) {
                        Some(value) => *value,
                        None => self
                            .read(key, |entry| entry.data.as_int(key))
                            .transpose()?
                            .unwrap_or(0),
                    };
                    let next = base.checked_add(*delta).ok_or_else(|| overflow(key, *delta))?;
                    pending.insert(key.as_str(), next);
                }
                Command::SetAdd { key, .. } => {
                    if let Some(kind) = self.read(key, |entry| entry.data.kind()) {
                        if kind != "set" {
                            return Err(wrong_type(key, "set", kind));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_counter(&self, key: &str) -> Result<Option<i64>> {
        self.round_trip()?;
        self.read(key, |entry| entry.data.as_int(key)).transpose()
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.round_trip()?;
        self.read(key, |entry| match &entry.data {
            Data::Int(v) => Ok(v.to_string()),
            Data::Str(s) => Ok(s.clone()),
            Data::Set(_) => Err(wrong_type(key, "string", "set")),
        })
        .transpose()
    }

    fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.round_trip()?;
        let _gate = self.commit_gate.read();
        self.apply_incr(key, delta)
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        if ttl.is_zero() {
            return Err(Error::InvalidInput(format!("expiry for {key} must be positive")));
        }
        self.round_trip()?;
        let expires_at = expiry_after(key, ttl)?;
        self.mutate(key, |slot| {
            if slot.is_some() {
                return Ok(false);
            }
            let mut entry = Entry::new(Data::Str(value.to_owned()), self.next_version());
            entry.expires_at = Some(expires_at);
            *slot = Some(entry);
            Ok(true)
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.round_trip()?;
        self.mutate(key, |slot| Ok(slot.take().is_some()))
    }

    fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        self.round_trip()?;
        self.mutate(key, |slot| {
            let matches = slot
                .as_ref()
                .map_or(false, |entry| entry.data.matches_str(expected));
            if matches {
                *slot = None;
            }
            Ok(matches)
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.round_trip()?;
        let expires_at = expiry_after(key, ttl)?;
        self.mutate(key, |slot| match slot {
            Some(entry) => {
                entry.expires_at = Some(expires_at);
                entry.version = self.next_version();
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.round_trip()?;
        let now = Instant::now();
        Ok(self
            .read(key, |entry| entry.expires_at.map(|at| at.saturating_duration_since(now)))
            .flatten())
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.round_trip()?;
        let _gate = self.commit_gate.read();
        self.apply_set_add(key, member)
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.round_trip()?;
        self.mutate(key, |slot| {
            let removed = match slot {
                Some(entry) => match &mut entry.data {
                    Data::Set(members) => members.remove(member),
                    other => return Err(wrong_type(key, "set", other.kind())),
                },
                None => false,
            };
            if removed {
                let now_empty = matches!(slot, Some(Entry { data: Data::Set(m), .. }) if m.is_empty());
                if now_empty {
                    *slot = None;
                } else if let Some(entry) = slot {
                    entry.version = self.next_version();
                }
            }
            Ok(removed)
        })
    }

    fn set_cardinality(&self, key: &str) -> Result<u64> {
        self.round_trip()?;
        self.read(key, |entry| match &entry.data {
            Data::Set(members) => Ok(members.len() as u64),
            other => Err(wrong_type(key, "set", other.kind())),
        })
        .transpose()
        .map(|count| count.unwrap_or(0))
    }

    fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        self.round_trip()?;
        self.read(key, |entry| match &entry.data {
            Data::Set(members) => Ok(members.contains(member)),
            other => Err(wrong_type(key, "set", other.kind())),
        })
        .transpose()
        .map(|found| found.unwrap_or(false))
    }

    fn watch(&self, key: &str) -> Result<WatchVersion> {
        self.round_trip()?;
        Ok(WatchVersion(self.read(key, |entry| entry.version)))
    }

    fn exec(
        &self,
        watched: &[(String, WatchVersion)],
        commands: &[Command],
    ) -> Result<Option<Vec<i64>>> {
        self.round_trip()?;
        let _gate = self.commit_gate.write();

        for (key, marker) in watched {
            let current = WatchVersion(self.read(key, |entry| entry.version));
            if current != *marker {
                tracing::debug!(key = %key, watched = ?marker, current = ?current, "exec aborted");
                return Ok(None);
            }
        }

        self.validate_commands(commands)?;

        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = match command {
                Command::IncrBy { key, delta } => self.apply_incr(key, *delta)?,
                Command::SetAdd { key, member } => i64::from(self.apply_set_add(key, member)?),
            };
            results.push(result);
        }
        Ok(Some(results))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.entries.len())
            .field("version", &self.version())
            .field("available", &self.is_available())
            .finish()
    }
}
