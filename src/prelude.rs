//! Convenient imports for Stockguard.
//!
//! ```ignore
//! use stockguard::prelude::*;
//!
//! let inventory = Inventory::new(Arc::new(MemoryStore::new()));
//! ```

// Main entry point
pub use crate::inventory::{Inventory, InventoryBuilder};
pub use crate::config::InventoryConfig;

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use crate::types::{GuardKind, KeyValueStore, MemoryStore, OrderId, ProductId, RetryPolicy};

// Lock settings
pub use crate::types::{AcquireMode, LockOwnership};

pub use std::sync::Arc;
pub use std::time::Duration;
