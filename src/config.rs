//! Inventory configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "guard": "distributed",
//!   "lock_wait": 500,
//!   "lock_ttl": 1000,
//!   "lock_acquire": { "mode": "bounded_poll", "interval": 10 },
//!   "lock_ownership": "holder_token",
//!   "retry": { "max_attempts": 3, "initial_backoff": 1, "max_backoff": 50, "jitter": true }
//! }
//! ```
//!
//! Durations are integer milliseconds.

use serde::{Deserialize, Serialize};
use stockguard_concurrency::{GuardKind, LockSettings, RetryPolicy};
use stockguard_core::error::{Error, Result};

/// Settings of an [`Inventory`](crate::Inventory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Guard used by operations that do not name one
    pub guard: GuardKind,
    /// Lock wait, lock TTL, acquisition and ownership
    #[serde(flatten)]
    pub lock: LockSettings,
    /// Retry of lock timeouts and transaction conflicts
    pub retry: RetryPolicy,
}

impl InventoryConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("invalid inventory config: {e}")))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("failed to serialize inventory config: {e}")))
    }
}
