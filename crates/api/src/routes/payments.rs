//! Payment provider webhook.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use event_store::EventStore;
use payments::SIGNATURE_HEADER;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
}

/// POST /payments/webhook
///
/// Every verified notification is acknowledged with 200, including
/// duplicates and ones that change nothing. Signature failures are 400.
#[tracing::instrument(skip_all)]
pub async fn webhook<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.payment_webhooks.handle(signature, &body).await?;

    Ok(Json(WebhookResponse {
        received: true,
        outcome: outcome.label(),
    }))
}
