//! Checkout and the caller's orders.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{Aggregate, Order, OrderLine, OrderStatus};
use event_store::EventStore;
use projections::{OrderSummary, OrderSummaryLine};
use serde::{Deserialize, Serialize};

use super::parse_order_id;
use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
}

#[derive(Deserialize)]
pub struct PayRequest {
    pub success_url: String,
    pub cancel_url: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub item_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl OrderLineResponse {
    fn new(item_id: String, quantity: u32, unit_price_cents: i64) -> Self {
        Self {
            item_id,
            quantity,
            unit_price_cents,
            line_total_cents: unit_price_cents.saturating_mul(i64::from(quantity)),
        }
    }
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self::new(
            line.product_id.to_string(),
            line.quantity,
            line.unit_price.cents(),
        )
    }
}

impl From<OrderSummaryLine> for OrderLineResponse {
    fn from(line: OrderSummaryLine) -> Self {
        Self::new(
            line.product_id.to_string(),
            line.quantity,
            line.unit_price.cents(),
        )
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineResponse>,
    pub total_cents: i64,
    pub shipping_address: String,
    pub created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_session_id: Option<String>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            customer_id: order
                .customer_id()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            status: order.status(),
            lines: order.lines().iter().map(Into::into).collect(),
            total_cents: order.total().cents(),
            shipping_address: order.shipping_address().to_string(),
            created_at: order.created_at(),
            paid_at: order.paid_at(),
            payment_session_id: order.payment_session_id().map(String::from),
        }
    }
}

impl From<OrderSummary> for OrderResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            id: summary.order_id.to_string(),
            customer_id: summary.customer_id.to_string(),
            status: summary.status,
            lines: summary.lines.into_iter().map(Into::into).collect(),
            total_cents: summary.total.cents(),
            shipping_address: summary.shipping_address,
            created_at: Some(summary.created_at),
            paid_at: summary.paid_at,
            payment_session_id: summary.payment_session_id,
        }
    }
}

#[derive(Serialize)]
pub struct PaymentSessionResponse {
    pub session_id: String,
    pub url: String,
}

// -- Handlers --

/// POST /orders/create: turns the caller's cart into a PENDING order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .checkout
        .place_order(caller.id, &req.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the caller's orders, newest first, from the read model.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    state.refresh_read_model().await?;

    let orders = state.order_summaries.for_customer(caller.id).await;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{id}: visible to its owner and to administrators.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;

    let order = if caller.is_admin {
        state
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?
    } else {
        state.orders.get_customer_order(caller.id, order_id).await?
    };

    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel: the owner cancels a PENDING order. Cancelling a
/// cancelled order succeeds without changing anything.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.cancel_by_customer(caller.id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/pay: opens a payment session for a PENDING order.
#[tracing::instrument(skip(state, req))]
pub async fn pay<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<PayRequest>,
) -> Result<Json<PaymentSessionResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let session = state
        .payment_sessions
        .open_session(caller.id, order_id, &req.success_url, &req.cancel_url)
        .await?;

    Ok(Json(PaymentSessionResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}
