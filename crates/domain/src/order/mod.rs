//! Orders: the immutable record of a checkout and its status over time.

mod aggregate;
mod events;
mod service;
mod status;

pub use aggregate::{Order, OrderLine};
pub use events::{
    OrderCancelledData, OrderEvent, OrderPaidData, OrderPlacedData, PaymentSessionOpenedData,
};
pub use service::{OrderService, PaymentConfirmation};
pub use status::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid status: {value}")]
    InvalidStatus { value: String },

    /// The administrative transition table does not allow this move.
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order cannot be cancelled in {status} status")]
    NotCancellable { status: OrderStatus },

    #[error("Order cannot be paid in {status} status")]
    NotPayable { status: OrderStatus },

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has no lines")]
    NoLines,

    #[error("Shipping address is required")]
    MissingShippingAddress,

    #[error("Order total is too large")]
    TotalOverflow,
}
