//! Inventory ledger: one stream per product holding its available quantity.

mod aggregate;
mod events;
mod service;

pub use aggregate::InventoryItem;
pub use events::{InventoryEvent, ItemListedData, PriceChangedData, StockMovementData};
pub use service::InventoryService;

use thiserror::Error;

use crate::value_objects::{Money, ProductId};

/// Errors raised by the inventory ledger.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Item not found: {product_id}")]
    NotListed { product_id: ProductId },

    #[error("Item already listed: {product_id}")]
    AlreadyListed { product_id: ProductId },

    /// Not enough stock; reports what is available right now.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Stock overflow: {available} available, cannot add {added}")]
    QuantityOverflow { available: u32, added: u32 },

    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: Money },
}
