//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, CustomerId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{Money, ProductId};

use super::{
    OrderError, OrderEvent, OrderStatus,
    events::{OrderCancelledData, OrderPaidData, OrderPlacedData, PaymentSessionOpenedData},
};

/// One line of an order, with the unit price frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// `None` when the line total does not fit in a `Money`.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// Order aggregate root.
///
/// Lines, total and shipping address are fixed by `OrderPlaced`; afterwards
/// only the status and payment details change. Orders are never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    customer_id: Option<CustomerId>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total: Money,
    shipping_address: String,
    created_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    payment_session_id: Option<String>,

    /// Set once the reserved stock has gone back to the ledger.
    stock_released: bool,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => {
                self.id = Some(data.order_id);
                self.customer_id = Some(data.customer_id);
                self.status = OrderStatus::Pending;
                self.lines = data.lines;
                self.total = data.total;
                self.shipping_address = data.shipping_address;
                self.created_at = Some(data.placed_at);
            }
            OrderEvent::PaymentSessionOpened(data) => {
                self.payment_session_id = Some(data.session_id);
            }
            OrderEvent::OrderPaid(data) => {
                self.status = OrderStatus::Paid;
                self.paid_at = self.paid_at.or(Some(data.paid_at));
                if data.payment_session_id.is_some() {
                    self.payment_session_id = data.payment_session_id;
                }
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                if data.release_stock {
                    self.stock_released = true;
                }
            }
            OrderEvent::OrderShipped { .. } => self.status = OrderStatus::Shipped,
            OrderEvent::OrderDelivered { .. } => self.status = OrderStatus::Delivered,
        }
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn is_owned_by(&self, customer: CustomerId) -> bool {
        self.customer_id == Some(customer)
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Lines in product id order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn payment_session_id(&self) -> Option<&str> {
        self.payment_session_id.as_deref()
    }

    pub fn stock_released(&self) -> bool {
        self.stock_released
    }
}

// Command methods (return events)
impl Order {
    /// Freezes `lines` into a new PENDING order.
    pub fn place(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        mut lines: Vec<OrderLine>,
        shipping_address: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.exists() {
            return Err(OrderError::AlreadyPlaced);
        }
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        let shipping_address = shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(OrderError::MissingShippingAddress);
        }

        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        let total = lines
            .iter()
            .try_fold(Money::zero(), |total, line| {
                line.total_price()?.checked_add(total)
            })
            .ok_or(OrderError::TotalOverflow)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            customer_id,
            lines,
            total,
            shipping_address: shipping_address.to_string(),
            placed_at: Utc::now(),
        })])
    }

    /// Records a provider session. A PENDING order may open several; the
    /// latest is kept.
    pub fn open_payment_session(&self, session_id: String) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.is_payable() {
            return Err(OrderError::NotPayable {
                status: self.status,
            });
        }
        Ok(vec![OrderEvent::PaymentSessionOpened(
            PaymentSessionOpenedData { session_id },
        )])
    }

    /// Marks a PENDING order as paid by the provider. Already PAID is a no-op.
    pub fn confirm_payment(&self, session_id: Option<String>) -> Result<Vec<OrderEvent>, OrderError> {
        match self.status {
            OrderStatus::Paid => Ok(vec![]),
            OrderStatus::Pending => Ok(vec![self.paid(session_id)]),
            status => Err(OrderError::NotPayable { status }),
        }
    }

    /// Self-service cancellation, allowed only while PENDING. Cancelling a
    /// cancelled order is a no-op.
    pub fn cancel_by_customer(&self, cancelled_by: &str) -> Result<Vec<OrderEvent>, OrderError> {
        match self.status {
            OrderStatus::Cancelled => Ok(vec![]),
            status if status.can_self_cancel() => Ok(vec![self.cancelled(cancelled_by)]),
            status => Err(OrderError::NotCancellable { status }),
        }
    }

    /// Administrative status change. Requesting the current status is a
    /// no-op; anything outside the transition table is rejected.
    pub fn transition_to(
        &self,
        target: OrderStatus,
        changed_by: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if target == self.status {
            return Ok(vec![]);
        }
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let event = match target {
            OrderStatus::Paid => self.paid(None),
            OrderStatus::Cancelled => self.cancelled(changed_by),
            OrderStatus::Shipped => OrderEvent::OrderShipped {
                shipped_at: Utc::now(),
            },
            OrderStatus::Delivered => OrderEvent::OrderDelivered {
                delivered_at: Utc::now(),
            },
            OrderStatus::Pending => {
                return Err(OrderError::InvalidTransition {
                    from: self.status,
                    to: target,
                });
            }
        };
        Ok(vec![event])
    }

    /// Lines whose stock a recorded cancellation must return, or nothing if
    /// the events do not release stock.
    pub fn lines_released_by(&self, events: &[OrderEvent]) -> &[OrderLine] {
        let releases = events.iter().any(|e| {
            matches!(
                e,
                OrderEvent::OrderCancelled(OrderCancelledData {
                    release_stock: true,
                    ..
                })
            )
        });
        if releases { &self.lines } else { &[] }
    }

    fn paid(&self, payment_session_id: Option<String>) -> OrderEvent {
        OrderEvent::OrderPaid(OrderPaidData {
            paid_at: self.paid_at.unwrap_or_else(Utc::now),
            payment_session_id,
        })
    }

    fn cancelled(&self, cancelled_by: &str) -> OrderEvent {
        OrderEvent::OrderCancelled(OrderCancelledData {
            cancelled_at: Utc::now(),
            cancelled_by: cancelled_by.to_string(),
            release_stock: !self.stock_released,
        })
    }
}
