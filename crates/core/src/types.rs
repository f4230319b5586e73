//! Identifier types for inventory records
//!
//! This module defines the identifiers that flow through every operation:
//! - [`ProductId`]: identifies one product's stock counter, order set and lock
//! - [`OrderId`]: caller-supplied unique order reference for set-based accounting

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Identifier of a product whose stock is guarded
///
/// ProductId is embedded verbatim into every store key built for the
/// product, so it must be non-empty and free of whitespace.
///
/// # Examples
///
/// ```
/// use stockguard_core::types::ProductId;
///
/// let id = ProductId::new("11002").unwrap();
/// assert_eq!(id.as_str(), "11002");
/// assert!(ProductId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    /// Create a ProductId, rejecting empty or whitespace-bearing ids
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_id("product id", &id)?;
        Ok(ProductId(id))
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Caller-supplied order reference
///
/// Used as the member of the per-product order set. Adding the same OrderId
/// twice is a no-op, which is what makes set-based accounting idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Create an OrderId, rejecting empty or whitespace-bearing ids
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_id("order id", &id)?;
        Ok(OrderId(id))
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidInput(format!("{what} must not be empty")));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!(
            "{what} must not contain whitespace: {id:?}"
        )));
    }
    Ok(())
}
