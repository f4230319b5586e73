//! Storage layer for stockguard
//!
//! This crate implements the in-process store backend:
//! - MemoryStore: sharded DashMap storage implementing `KeyValueStore`
//! - Per-key versions for watch/multi/exec
//! - Lazily expiring keys
//! - Fault and latency injection for exercising guards

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::MemoryStore;
