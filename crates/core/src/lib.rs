//! Core types for stockguard
//!
//! This crate defines the vocabulary shared by the storage, concurrency and
//! inventory layers:
//! - Error taxonomy ([`Error`], [`Result`])
//! - Identifiers ([`ProductId`], [`OrderId`])
//! - Key namespacing ([`keys`])
//! - The [`KeyValueStore`] capability and its transaction commands

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod duration_ms;
pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use keys::KeyKind;
pub use traits::{Command, CommandBatch, KeyValueStore, WatchSet, WatchVersion};
pub use types::{OrderId, ProductId};
