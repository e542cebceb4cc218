//! Inventory ledger events.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, ProductId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    /// Product entered the catalog with an opening quantity.
    ItemListed(ItemListedData),

    /// Stock was received.
    StockAdded { quantity: u32 },

    PriceChanged(PriceChangedData),

    /// Stock was taken for an order at checkout.
    StockReserved(StockMovementData),

    /// Stock came back from a cancelled order.
    StockReleased(StockMovementData),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemListed(_) => "ItemListed",
            InventoryEvent::StockAdded { .. } => "StockAdded",
            InventoryEvent::PriceChanged(_) => "PriceChanged",
            InventoryEvent::StockReserved(_) => "StockReserved",
            InventoryEvent::StockReleased(_) => "StockReleased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemListedData {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangedData {
    pub old_price: Money,
    pub new_price: Money,
}

/// A reservation or release of stock on behalf of one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementData {
    pub order_id: AggregateId,
    pub quantity: u32,
}
