//! Order summaries for "my orders" and the admin order list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, CustomerId};
use domain::{Money, OrderEvent, OrderStatus, ProductId};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummaryLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Denormalized view of one order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub lines: Vec<OrderSummaryLine>,
    pub total: Money,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_session_id: Option<String>,
    pub updated_at: DateTime<Utc>,

    /// Version of the last order event folded in.
    #[serde(skip)]
    pub version: Version,
}

#[derive(Default)]
struct OrderSummaryState {
    orders: HashMap<AggregateId, OrderSummary>,
    by_customer: HashMap<CustomerId, Vec<AggregateId>>,
    position: ProjectionPosition,
}

/// Every order, queryable by customer and by status.
///
/// Events at or below an order's recorded version are ignored, so delivering
/// an event twice is harmless.
#[derive(Clone, Default)]
pub struct OrderSummaryView {
    state: Arc<RwLock<OrderSummaryState>>,
}

impl OrderSummaryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// The customer's orders, newest first.
    pub async fn for_customer(&self, customer_id: CustomerId) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        let Some(ids) = state.by_customer.get(&customer_id) else {
            return Vec::new();
        };
        let mut orders: Vec<_> = ids
            .iter()
            .filter_map(|id| state.orders.get(id).cloned())
            .collect();
        sort_newest_first(&mut orders);
        orders
    }

    /// All orders, newest first, optionally only those in `status`.
    pub async fn all(&self, status: Option<OrderStatus>) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        orders
    }

    fn apply(state: &mut OrderSummaryState, envelope: &EventEnvelope, event: OrderEvent) {
        let order_id = envelope.aggregate_id;

        if let OrderEvent::OrderPlaced(data) = event {
            if state.orders.contains_key(&order_id) {
                return;
            }
            state
                .by_customer
                .entry(data.customer_id)
                .or_default()
                .push(order_id);
            state.orders.insert(
                order_id,
                OrderSummary {
                    order_id,
                    customer_id: data.customer_id,
                    status: OrderStatus::Pending,
                    lines: data
                        .lines
                        .into_iter()
                        .map(|line| OrderSummaryLine {
                            product_id: line.product_id,
                            quantity: line.quantity,
                            unit_price: line.unit_price,
                        })
                        .collect(),
                    total: data.total,
                    shipping_address: data.shipping_address,
                    created_at: data.placed_at,
                    paid_at: None,
                    payment_session_id: None,
                    updated_at: envelope.timestamp,
                    version: envelope.version,
                },
            );
            return;
        }

        let Some(summary) = state.orders.get_mut(&order_id) else {
            tracing::warn!(%order_id, event_type = %envelope.event_type, "event for an order never placed");
            return;
        };
        if envelope.version <= summary.version {
            return;
        }

        match event {
            OrderEvent::OrderPlaced(_) => {}
            OrderEvent::PaymentSessionOpened(data) => {
                summary.payment_session_id = Some(data.session_id);
            }
            OrderEvent::OrderPaid(data) => {
                summary.status = OrderStatus::Paid;
                summary.paid_at = summary.paid_at.or(Some(data.paid_at));
                if data.payment_session_id.is_some() {
                    summary.payment_session_id = data.payment_session_id;
                }
            }
            OrderEvent::OrderCancelled(_) => summary.status = OrderStatus::Cancelled,
            OrderEvent::OrderShipped { .. } => summary.status = OrderStatus::Shipped,
            OrderEvent::OrderDelivered { .. } => summary.status = OrderStatus::Delivered,
        }
        summary.version = envelope.version;
        summary.updated_at = envelope.timestamp;
    }
}

fn sort_newest_first(orders: &mut [OrderSummary]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
}

#[async_trait]
impl Projection for OrderSummaryView {
    fn name(&self) -> &'static str {
        "OrderSummaryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        if event.aggregate_type == "Order" {
            let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
            Self::apply(&mut state, event, order_event);
        }
        state.position = state.position.after(event);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OrderSummaryState::default();
        Ok(())
    }
}

impl ReadModel for OrderSummaryView {
    fn name(&self) -> &'static str {
        "OrderSummaryView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
