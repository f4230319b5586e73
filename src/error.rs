//! Error types for Stockguard.
//!
//! Every layer reports through one error enum defined in `stockguard-core`;
//! this module re-exports it for users of the facade crate.

pub use stockguard_core::error::{Error, Result};
