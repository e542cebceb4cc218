use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::value_objects::{Money, ProductId};

use super::{
    InventoryError, InventoryEvent,
    events::{ItemListedData, PriceChangedData, StockMovementData},
};

/// Stock ledger for one product.
///
/// `available` is the single source of truth for how much can be sold right
/// now. It only goes down through [`try_reserve`](InventoryItem::try_reserve),
/// which refuses to take it below zero; concurrent reservations are
/// linearized by the stream version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryItem {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    product_id: Option<ProductId>,
    name: String,
    unit_price: Money,
    available: u32,
}

impl Aggregate for InventoryItem {
    type Event = InventoryEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        "InventoryItem"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            InventoryEvent::ItemListed(data) => {
                self.id = Some(data.product_id.stream_id());
                self.product_id = Some(data.product_id);
                self.name = data.name;
                self.unit_price = data.unit_price;
                self.available = data.quantity;
            }
            InventoryEvent::StockAdded { quantity } => {
                self.available = self.available.saturating_add(quantity);
            }
            InventoryEvent::PriceChanged(data) => self.unit_price = data.new_price,
            InventoryEvent::StockReserved(data) => {
                self.available = self.available.saturating_sub(data.quantity);
            }
            InventoryEvent::StockReleased(data) => {
                self.available = self.available.saturating_add(data.quantity);
            }
        }
    }
}

impl SnapshotCapable for InventoryItem {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl InventoryItem {
    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current catalog price. Orders copy it at checkout.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn available(&self) -> u32 {
        self.available
    }
}

// Command methods (return events)
impl InventoryItem {
    pub fn list(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        if self.exists() {
            return Err(InventoryError::AlreadyListed { product_id });
        }
        if !unit_price.is_positive() {
            return Err(InventoryError::InvalidPrice { price: unit_price });
        }

        Ok(vec![InventoryEvent::ItemListed(ItemListedData {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
        })])
    }

    pub fn restock(&self, quantity: u32) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.ensure_listed()?;
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        self.checked_increase(quantity)?;

        Ok(vec![InventoryEvent::StockAdded { quantity }])
    }

    /// Changes the catalog price. Existing orders keep the price they were
    /// placed at.
    pub fn change_price(&self, new_price: Money) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.ensure_listed()?;
        if !new_price.is_positive() {
            return Err(InventoryError::InvalidPrice { price: new_price });
        }
        if new_price == self.unit_price {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::PriceChanged(PriceChangedData {
            old_price: self.unit_price,
            new_price,
        })])
    }

    /// Takes `quantity` units for `order_id` if that many are available.
    ///
    /// On refusal nothing changes and the error carries the quantity that is
    /// available right now.
    pub fn try_reserve(
        &self,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        let product_id = self.ensure_listed()?;
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        if self.available < quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: self.available,
            });
        }

        Ok(vec![InventoryEvent::StockReserved(StockMovementData {
            order_id,
            quantity,
        })])
    }

    /// Puts `quantity` units back. Callers guarantee it runs once per order.
    pub fn release(
        &self,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.ensure_listed()?;
        self.checked_increase(quantity)?;
        Ok(vec![InventoryEvent::StockReleased(StockMovementData {
            order_id,
            quantity,
        })])
    }

    /// Refuses any increase the ledger could not hold.
    fn checked_increase(&self, quantity: u32) -> Result<u32, InventoryError> {
        self.available
            .checked_add(quantity)
            .ok_or(InventoryError::QuantityOverflow {
                available: self.available,
                added: quantity,
            })
    }

    /// Services load items by SKU and reject unknown ones before calling a
    /// command, so this only guards direct use of a default item.
    fn ensure_listed(&self) -> Result<&ProductId, InventoryError> {
        self.product_id
            .as_ref()
            .ok_or_else(|| InventoryError::NotListed {
                product_id: ProductId::default(),
            })
    }
}
