//! Serde adapter storing a `Duration` as integer milliseconds.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Settings {
//!     #[serde(with = "stockguard_core::duration_ms")]
//!     wait: Duration,
//! }
//! ```

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serialize as whole milliseconds, saturating at `u64::MAX`
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Deserialize from whole milliseconds
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
