//! Key namespacing
//!
//! Every store key is a pure function of a namespace literal and a
//! [`ProductId`]. The layout is persisted state shared with other processes
//! and must stay bit-exact:
//!
//! | Kind | Layout |
//! |------|--------|
//! | Counter | `PRODUCT:STOCKED:<productId>` |
//! | Order set | `PRODUCT:SET:STOCKED:<productId>` |
//! | Lock | `PRODUCT:LOCK:<productId>` |

use crate::types::ProductId;

/// Namespace literal for stock counters
pub const COUNTER_NAMESPACE: &str = "PRODUCT:STOCKED";

/// Namespace literal for order sets
pub const ORDER_SET_NAMESPACE: &str = "PRODUCT:SET:STOCKED";

/// Namespace literal for lock tokens
pub const LOCK_NAMESPACE: &str = "PRODUCT:LOCK";

/// The kinds of keys kept per product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Signed stock counter
    Counter,
    /// Set of unique order ids
    OrderSet,
    /// Lock token guarding the counter
    Lock,
}

impl KeyKind {
    /// All key kinds, in teardown order
    pub const ALL: [KeyKind; 3] = [KeyKind::Counter, KeyKind::OrderSet, KeyKind::Lock];

    /// Namespace literal for this kind
    pub fn namespace(self) -> &'static str {
        match self {
            KeyKind::Counter => COUNTER_NAMESPACE,
            KeyKind::OrderSet => ORDER_SET_NAMESPACE,
            KeyKind::Lock => LOCK_NAMESPACE,
        }
    }

    /// Build the key of this kind for `product`
    pub fn key(self, product: &ProductId) -> String {
        format!("{}:{}", self.namespace(), product)
    }
}

/// `PRODUCT:STOCKED:<productId>`
pub fn counter_key(product: &ProductId) -> String {
    KeyKind::Counter.key(product)
}

/// `PRODUCT:SET:STOCKED:<productId>`
pub fn order_set_key(product: &ProductId) -> String {
    KeyKind::OrderSet.key(product)
}

/// `PRODUCT:LOCK:<productId>`
pub fn lock_key(product: &ProductId) -> String {
    KeyKind::Lock.key(product)
}
