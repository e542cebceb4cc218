//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, CustomerId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

use super::OrderLine;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Checkout turned a cart into this order.
    OrderPlaced(OrderPlacedData),

    /// A payment session was opened with the provider.
    PaymentSessionOpened(PaymentSessionOpenedData),

    OrderPaid(OrderPaidData),

    OrderCancelled(OrderCancelledData),

    OrderShipped { shipped_at: DateTime<Utc> },

    OrderDelivered { delivered_at: DateTime<Utc> },
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentSessionOpened(_) => "PaymentSessionOpened",
            OrderEvent::OrderPaid(_) => "OrderPaid",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderShipped { .. } => "OrderShipped",
            OrderEvent::OrderDelivered { .. } => "OrderDelivered",
        }
    }
}

/// The frozen order. `total` is the sum of the line totals at placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub shipping_address: String,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSessionOpenedData {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub paid_at: DateTime<Utc>,

    /// Provider session that settled, when paid through the provider.
    pub payment_session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: String,

    /// Whether this cancellation returns the reserved stock. Recorded in the
    /// same append as the matching `StockReleased` events.
    pub release_stock: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ProductId;

    #[test]
    fn placed_event_keeps_line_snapshot() {
        let event = OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: AggregateId::new(),
            customer_id: CustomerId::new(),
            lines: vec![OrderLine {
                product_id: ProductId::new("SKU-001"),
                quantity: 2,
                unit_price: Money::from_cents(100),
            }],
            total: Money::from_cents(200),
            shipping_address: "1 Main St".into(),
            placed_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderPlaced");
        assert_eq!(json["data"]["lines"][0]["unit_price"], 100);
        assert_eq!(json["data"]["total"], 200);

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "OrderPlaced");
    }

    #[test]
    fn unit_variants_carry_timestamps() {
        let event = OrderEvent::OrderShipped {
            shipped_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"]["shipped_at"].is_string());
    }
}
