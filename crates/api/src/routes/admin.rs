//! Administrator endpoints: order fulfillment and the catalog.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{Aggregate, Money, OrderStatus, ProductId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::items::ItemResponse;
use super::orders::OrderResponse;
use super::parse_order_id;
use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct ListItemRequest {
    pub item_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ChangePriceRequest {
    pub unit_price_cents: i64,
}

/// POST /admin/orders/{id}/set-status
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn set_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    caller.require_admin()?;
    let order_id = parse_order_id(&id)?;
    let status: OrderStatus = req.status.parse().map_err(domain::DomainError::from)?;

    let order = state
        .orders
        .set_status(&caller.actor(), order_id, status)
        .await?;

    Ok(Json(StatusResponse {
        id: order.id().unwrap_or(order_id).to_string(),
        status: order.status(),
    }))
}

/// GET /admin/orders?status=PAID
#[tracing::instrument(skip(state))]
pub async fn list_orders<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    caller.require_admin()?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(domain::DomainError::from)?;

    state.refresh_read_model().await?;
    let orders = state.order_summaries.all(status).await;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// POST /admin/items: lists a new item with its opening stock.
#[tracing::instrument(skip(state, req), fields(item_id = %req.item_id))]
pub async fn list_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<ListItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    caller.require_admin()?;
    let item = state
        .inventory
        .list_item(
            &caller.actor(),
            &ProductId::new(req.item_id),
            &req.name,
            Money::from_cents(req.unit_price_cents),
            req.quantity,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ItemResponse::from(&item))))
}

/// POST /admin/items/{id}/restock
#[tracing::instrument(skip(state, req), fields(quantity = req.quantity))]
pub async fn restock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    caller.require_admin()?;
    let item = state
        .inventory
        .restock(&caller.actor(), &ProductId::new(id), req.quantity)
        .await?;
    Ok(Json(ItemResponse::from(&item)))
}

/// POST /admin/items/{id}/price: affects orders placed from now on.
#[tracing::instrument(skip(state, req), fields(unit_price_cents = req.unit_price_cents))]
pub async fn change_price<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<ChangePriceRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    caller.require_admin()?;
    let item = state
        .inventory
        .change_price(
            &caller.actor(),
            &ProductId::new(id),
            Money::from_cents(req.unit_price_cents),
        )
        .await?;
    Ok(Json(ItemResponse::from(&item)))
}
