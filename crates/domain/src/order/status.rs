//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order.
///
/// Administrative transitions:
/// ```text
/// PENDING ──► PAID ──► SHIPPED ──► DELIVERED
///    │          │         │
///    └──────────┴─────────┴──► CANCELLED
/// ```
/// Customers may only cancel from PENDING. CANCELLED and DELIVERED are
/// terminal. Requesting the status an order already has is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, stock reserved, awaiting payment.
    #[default]
    Pending,
    Paid,
    Cancelled,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    /// Whether an administrator may move an order from `self` to `target`.
    ///
    /// Staying in the same status is not a transition; callers treat it as a
    /// no-op before consulting this table.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Shipped)
                | (Paid, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Cancelled)
        )
    }

    /// Whether the customer may cancel by themselves.
    pub fn can_self_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Whether a payment can be started or confirmed.
    pub fn is_payable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    /// Parses an exact status name. Anything else is `InvalidStatus`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::InvalidStatus {
                value: s.to_string(),
            })
    }
}
