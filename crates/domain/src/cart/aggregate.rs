use std::collections::BTreeMap;

use common::{AggregateId, CustomerId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::ProductId;

use super::{CartError, CartEvent, events::LineQuantitySetData};

/// One pending selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A customer's cart.
///
/// There is at most one per customer; its stream id is derived from the
/// owner, so it exists implicitly and is opened by its first change. Adding
/// to the cart checks availability but reserves nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    owner: Option<CustomerId>,

    /// Quantity per product, kept sorted by product id.
    lines: BTreeMap<ProductId, u32>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
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
            CartEvent::CartOpened { owner } => {
                self.id = Some(owner.cart_stream());
                self.owner = Some(owner);
            }
            CartEvent::LineQuantitySet(data) => {
                self.lines.insert(data.product_id, data.quantity);
            }
            CartEvent::LineRemoved { product_id } => {
                self.lines.remove(&product_id);
            }
            CartEvent::CartCleared { .. } | CartEvent::CartEmptied => self.lines.clear(),
        }
    }
}

// Query methods
impl Cart {
    pub fn owner(&self) -> Option<CustomerId> {
        self.owner
    }

    /// Lines in product id order.
    pub fn lines(&self) -> Vec<CartLine> {
        self.lines
            .iter()
            .map(|(product_id, &quantity)| CartLine {
                product_id: product_id.clone(),
                quantity,
            })
            .collect()
    }

    pub fn line(&self, product_id: &ProductId) -> Option<CartLine> {
        self.lines.get(product_id).map(|&quantity| CartLine {
            product_id: product_id.clone(),
            quantity,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// Command methods (return events)
impl Cart {
    /// Adds `quantity` units to a line, creating it if needed.
    ///
    /// The resulting line total must not exceed `available`.
    pub fn add(
        &self,
        owner: CustomerId,
        product_id: ProductId,
        quantity: u32,
        available: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let current = self.lines.get(&product_id).copied().unwrap_or(0);
        let requested = current.saturating_add(quantity);
        if requested > available {
            return Err(CartError::ExceedsAvailableStock {
                product_id,
                requested,
                available,
            });
        }

        let mut events = self.open_if_needed(owner);
        events.push(CartEvent::LineQuantitySet(LineQuantitySetData {
            product_id,
            quantity: requested,
        }));
        Ok(events)
    }

    /// Sets a line's quantity; 0 removes the line.
    pub fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
        available: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        let Some(&current) = self.lines.get(&product_id) else {
            return Err(CartError::LineNotFound { product_id });
        };

        if quantity == 0 {
            return Ok(vec![CartEvent::LineRemoved { product_id }]);
        }
        if quantity == current {
            return Ok(vec![]);
        }
        if quantity > available {
            return Err(CartError::ExceedsAvailableStock {
                product_id,
                requested: quantity,
                available,
            });
        }

        Ok(vec![CartEvent::LineQuantitySet(LineQuantitySetData {
            product_id,
            quantity,
        })])
    }

    pub fn remove(&self, product_id: ProductId) -> Result<Vec<CartEvent>, CartError> {
        if !self.lines.contains_key(&product_id) {
            return Err(CartError::LineNotFound { product_id });
        }
        Ok(vec![CartEvent::LineRemoved { product_id }])
    }

    /// Empties the cart into `order_id`.
    pub fn clear(&self, order_id: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Err(CartError::Empty);
        }
        Ok(vec![CartEvent::CartCleared { order_id }])
    }

    /// Drops every line. An empty cart stays as it is.
    pub fn empty(&self) -> Vec<CartEvent> {
        if self.lines.is_empty() {
            vec![]
        } else {
            vec![CartEvent::CartEmptied]
        }
    }

    fn open_if_needed(&self, owner: CustomerId) -> Vec<CartEvent> {
        if self.exists() {
            vec![]
        } else {
            vec![CartEvent::CartOpened { owner }]
        }
    }
}
