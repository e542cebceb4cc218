//! The caller's cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{Cart, CartLine, ProductId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub item_id: String,
    pub quantity: u32,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            item_id: line.product_id.to_string(),
            quantity: line.quantity,
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub customer_id: String,
    pub lines: Vec<CartLineResponse>,
}

impl CartResponse {
    fn new(caller: &Caller, cart: &Cart) -> Self {
        Self {
            customer_id: caller.id.to_string(),
            lines: cart.lines().into_iter().map(Into::into).collect(),
        }
    }
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(caller.id).await?;
    Ok(Json(CartResponse::new(&caller, &cart)))
}

/// POST /cart/add: adds units to a line, checked against current stock.
#[tracing::instrument(skip(state, req), fields(item_id = %req.item_id, quantity = req.quantity))]
pub async fn add<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartLineResponse>, ApiError> {
    let product_id = ProductId::new(req.item_id);
    let line = state
        .carts
        .add_item(caller.id, &product_id, req.quantity)
        .await?;
    Ok(Json(line.into()))
}

/// PATCH /cart/item/{item_id}: sets a line's quantity; 0 removes the line.
#[tracing::instrument(skip(state, req), fields(quantity = req.quantity))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartLineResponse>, ApiError> {
    let product_id = ProductId::new(item_id);
    let line = state
        .carts
        .set_quantity(caller.id, &product_id, req.quantity)
        .await?;

    let response = line.map(CartLineResponse::from).unwrap_or(CartLineResponse {
        item_id: product_id.to_string(),
        quantity: 0,
    });
    Ok(Json(response))
}

/// DELETE /cart: drops every line.
#[tracing::instrument(skip(state))]
pub async fn clear<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.clear_cart(caller.id).await?;
    Ok(Json(CartResponse::new(&caller, &cart)))
}

/// DELETE /cart/item/{item_id}
#[tracing::instrument(skip(state))]
pub async fn remove<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(item_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .remove_item(caller.id, &ProductId::new(item_id))
        .await?;
    Ok(Json(CartResponse::new(&caller, &cart)))
}
