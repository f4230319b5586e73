//! Stock validation rules.
//!
//! Pure functions from observed values to the delta to apply, or to the
//! rejection. The pre-checks run inside a guard before the mutation; the
//! post-checks run on the value the store returned after it.

use stockguard_core::error::{Error, Result};
use stockguard_core::types::ProductId;

/// Reject non-positive quantities before any store call.
pub(crate) fn check_quantity(what: &str, quantity: i64) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::InvalidInput(format!(
            "{what} must be positive, got {quantity}"
        )));
    }
    Ok(())
}

/// Reject a negative cap before any store call.
pub(crate) fn check_total(total: i64) -> Result<()> {
    if total < 0 {
        return Err(Error::InvalidInput(format!(
            "total quantity must not be negative, got {total}"
        )));
    }
    Ok(())
}

/// Decrement flow: stock counts down towards zero.
///
/// The sale is rejected when nothing is left, and also when it would take the
/// counter to zero or below, so the last unit is never sold on this path.
pub(crate) fn decrement_delta(product: &ProductId, current: i64, buy: i64) -> Result<i64> {
    if current <= 0 {
        return Err(Error::InsufficientStock {
            product_id: product.to_string(),
            current,
            limit: 0,
        });
    }
    if current.saturating_sub(buy) <= 0 {
        return Err(Error::SaleExceedsRemaining {
            product_id: product.to_string(),
            current,
            requested: buy,
            limit: 0,
        });
    }
    Ok(-buy)
}

/// Increment flow: the sold count grows towards `total`.
pub(crate) fn increment_delta(product: &ProductId, current: i64, total: i64, buy: i64) -> Result<i64> {
    if current >= total {
        return Err(Error::InsufficientStock {
            product_id: product.to_string(),
            current,
            limit: total,
        });
    }
    if current.saturating_add(buy) > total {
        return Err(Error::SaleExceedsRemaining {
            product_id: product.to_string(),
            current,
            requested: buy,
            limit: total,
        });
    }
    Ok(buy)
}

/// Compensating decrement of a sold count; never below zero.
pub(crate) fn refund_delta(product: &ProductId, current: i64, quantity: i64) -> Result<i64> {
    if quantity > current {
        return Err(Error::SaleExceedsRemaining {
            product_id: product.to_string(),
            current,
            requested: -quantity,
            limit: 0,
        });
    }
    Ok(-quantity)
}

/// Post-check of the decrement flow.
pub(crate) fn check_floor(product: &ProductId, value: i64, delta: i64) -> Result<i64> {
    if value < 0 {
        tracing::warn!(product_id = %product, result = value, delta, "stock went negative");
        return Err(Error::OverdraftOccurred {
            product_id: product.to_string(),
            value,
            delta,
            limit: 0,
        });
    }
    Ok(value)
}

/// Post-check of the increment and order-set flows.
pub(crate) fn check_cap(product: &ProductId, value: i64, delta: i64, total: i64) -> Result<i64> {
    if value > total {
        tracing::warn!(product_id = %product, result = value, delta, total, "sold count exceeds total");
        return Err(Error::OverdraftOccurred {
            product_id: product.to_string(),
            value,
            delta,
            limit: total,
        });
    }
    Ok(value)
}

/// Post-check of the order-set flow.
///
/// A duplicate order writes nothing, so a set that another caller pushed
/// past the cap is a plain rejection rather than an overdraft.
pub(crate) fn check_order_cap(
    product: &ProductId,
    value: i64,
    added: bool,
    total: i64,
) -> Result<i64> {
    if !added {
        if value > total {
            return Err(Error::InsufficientStock {
                product_id: product.to_string(),
                current: value,
                limit: total,
            });
        }
        return Ok(value);
    }
    check_cap(product, value, 1, total)
}
