//! Cart events.

use common::{AggregateId, CustomerId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::ProductId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// First change to a customer's cart.
    CartOpened { owner: CustomerId },

    /// A line now holds `quantity` units (added or changed).
    LineQuantitySet(LineQuantitySetData),

    LineRemoved { product_id: ProductId },

    /// All lines were turned into an order.
    CartCleared { order_id: AggregateId },

    /// The owner threw every line away.
    CartEmptied,
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened { .. } => "CartOpened",
            CartEvent::LineQuantitySet(_) => "LineQuantitySet",
            CartEvent::LineRemoved { .. } => "LineRemoved",
            CartEvent::CartCleared { .. } => "CartCleared",
            CartEvent::CartEmptied => "CartEmptied",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantitySetData {
    pub product_id: ProductId,
    pub quantity: u32,
}
