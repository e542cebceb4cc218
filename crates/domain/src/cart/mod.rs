//! Shopping carts: one mutable stream of pending selections per customer.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Cart, CartLine};
pub use events::{CartEvent, LineQuantitySetData};
pub use service::CartService;

use thiserror::Error;

use crate::value_objects::ProductId;

#[derive(Debug, Error)]
pub enum CartError {
    /// The requested line total is more than the ledger has right now.
    #[error("Only {available} of {product_id} available, requested {requested}")]
    ExceedsAvailableStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Item {product_id} is not in the cart")]
    LineNotFound { product_id: ProductId },

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Cart is empty")]
    Empty,
}
