//! Catalog lookups.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{InventoryItem, ProductId};
use event_store::EventStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ItemResponse {
    pub item_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub available_quantity: u32,
}

impl From<&InventoryItem> for ItemResponse {
    fn from(item: &InventoryItem) -> Self {
        Self {
            item_id: item.product_id().map(ToString::to_string).unwrap_or_default(),
            name: item.name().to_string(),
            unit_price_cents: item.unit_price().cents(),
            available_quantity: item.available(),
        }
    }
}

/// GET /items/{id}: current price and stock.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state
        .inventory
        .get_item(&ProductId::new(id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {id} not found")))?;
    Ok(Json(ItemResponse::from(&item)))
}
