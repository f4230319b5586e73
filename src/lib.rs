//! # Stockguard
//!
//! Oversell-safe inventory counters on top of an external key-value store.
//!
//! "Read stock, check it, write stock" is two store calls, so concurrent
//! callers can both pass the check and overshoot. Stockguard runs that
//! sequence under a selectable guard:
//!
//! | Guard | Effect |
//! |-------|--------|
//! | [`GuardKind::None`] | no protection, the race is observable |
//! | [`GuardKind::LocalExclusive`] | per-product mutex in this process |
//! | [`GuardKind::LocalReadWrite`] | per-product stamped write lock in this process |
//! | [`GuardKind::Distributed`] | self-expiring lock key in the store |
//! | [`GuardKind::Optimistic`] | watch/multi/exec, conflicts abort |
//!
//! ## Quick Start
//!
//! ```ignore
//! use stockguard::prelude::*;
//!
//! let store = Arc::new(MemoryStore::new());
//! let inventory = Inventory::builder()
//!     .store(store)
//!     .guard(GuardKind::Distributed)
//!     .retry(RetryPolicy::with_attempts(10))
//!     .build()?;
//!
//! let product = ProductId::new("11002")?;
//! inventory.increment_sold(&product, 1000, 10)?;
//! ```
//!
//! ## Flows
//!
//! - Decrement: the counter holds remaining stock ([`Inventory::decrement_stock`])
//! - Increment: the counter holds the sold count, capped by a total
//!   ([`Inventory::increment_sold`] and its guard-specific variants)
//! - Order set: the sold count is the number of distinct order ids
//!   ([`Inventory::record_unique_order`])

#![warn(missing_docs)]

mod config;
mod error;
mod inventory;
mod rules;
mod types;

pub mod prelude;

// Re-export main entry points
pub use config::InventoryConfig;
pub use error::{Error, Result};
pub use inventory::{Inventory, InventoryBuilder};

// Re-export types
pub use types::*;
