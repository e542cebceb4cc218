pub mod admin;
pub mod cart;
pub mod health;
pub mod items;
pub mod metrics;
pub mod orders;
pub mod payments;

use common::AggregateId;

use crate::error::ApiError;

pub(crate) fn parse_order_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
