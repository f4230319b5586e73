//! Error taxonomy for inventory operations.
//!
//! Every failure an Inventory Operation, a guard or a store can report is a
//! variant of [`Error`]. The variants split into four families:
//!
//! | Family | Variants | Stock mutated? |
//! |--------|----------|----------------|
//! | Rejection | `InsufficientStock`, `SaleExceedsRemaining` | No |
//! | Guard failure | `LockNotAcquired`, `TransactionConflict` | No |
//! | Overdraft | `OverdraftOccurred` | **Yes** |
//! | Infrastructure | `StoreUnavailable`, `WrongType`, `InvalidInput`, `Internal` | No |
//!
//! `OverdraftOccurred` is the only variant reported after the store already
//! applied the mutation. Callers must compensate for it.

use thiserror::Error;

/// All stockguard errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Stock is already exhausted: the counter is at or below zero on the
    /// decrement path, or at or above the cap on the increment path.
    #[error("insufficient stock for product {product_id}: current {current}, limit {limit}")]
    InsufficientStock {
        /// Product whose stock was inspected
        product_id: String,
        /// Counter value or set cardinality that was read
        current: i64,
        /// Floor (0) or cap (`totalQuantity`) the value was checked against
        limit: i64,
    },

    /// The requested quantity would cross the floor or the cap.
    #[error(
        "sale of {requested} exceeds remaining stock for product {product_id}: current {current}, limit {limit}"
    )]
    SaleExceedsRemaining {
        /// Product whose stock was inspected
        product_id: String,
        /// Counter value or set cardinality that was read
        current: i64,
        /// Requested quantity
        requested: i64,
        /// Floor (0) or cap (`totalQuantity`) the value was checked against
        limit: i64,
    },

    /// The atomic mutation itself drove the value past the boundary.
    ///
    /// The mutation HAS been applied. The caller is expected to compensate.
    #[error("overdraft on product {product_id}: value {value} crossed limit {limit} after applying {delta}")]
    OverdraftOccurred {
        /// Product whose stock overflowed
        product_id: String,
        /// Value observed right after the mutation
        value: i64,
        /// Delta that was applied
        delta: i64,
        /// Floor (0) or cap (`totalQuantity`) that was crossed
        limit: i64,
    },

    /// The guard could not be acquired within its wait budget.
    #[error("lock not acquired for product {product_id} within {waited_ms}ms")]
    LockNotAcquired {
        /// Product whose guard was contended
        product_id: String,
        /// Wait budget in milliseconds
        waited_ms: u64,
    },

    /// A watched key changed between watch and commit.
    #[error("transaction conflict on key {key}")]
    TransactionConflict {
        /// The watched key
        key: String,
    },

    /// Transport or connection failure talking to the store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The stored value is not of the kind the operation expects.
    #[error("wrong type at key {key}: expected {expected}, got {actual}")]
    WrongType {
        /// Key holding the value
        key: String,
        /// Expected value kind
        expected: &'static str,
        /// Actual value kind
        actual: &'static str,
    },

    /// Invalid arguments (non-positive quantity, empty id, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for stockguard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Retryable errors left stock untouched and may succeed when the whole
    /// operation is started again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LockNotAcquired { .. } | Error::TransactionConflict { .. }
        )
    }

    /// Check if this is a business rejection (not enough stock).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InsufficientStock { .. } | Error::SaleExceedsRemaining { .. }
        )
    }

    /// Check if this is a transaction conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionConflict { .. })
    }

    /// Check if the caller has to undo a mutation that already happened.
    pub fn requires_compensation(&self) -> bool {
        matches!(self, Error::OverdraftOccurred { .. })
    }

    /// Check if stock was mutated even though the call failed.
    pub fn mutation_applied(&self) -> bool {
        self.requires_compensation()
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::StoreUnavailable(_))
    }
}
