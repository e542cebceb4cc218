//! HTTP API for the order-fulfillment engine.
//!
//! Customers manage their cart, check out, pay and cancel; administrators
//! run the catalog and move orders through fulfillment; the payment provider
//! reports completed payments through a signed webhook. Requests are traced
//! with `tracing` and counted in Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/add", post(routes::cart::add::<S>))
        .route(
            "/cart/item/{item_id}",
            patch(routes::cart::update::<S>).delete(routes::cart::remove::<S>),
        )
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/create", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/pay", post(routes::orders::pay::<S>))
        .route("/items/{id}", get(routes::items::get::<S>))
        .route("/admin/orders", get(routes::admin::list_orders::<S>))
        .route(
            "/admin/orders/{id}/set-status",
            post(routes::admin::set_status::<S>),
        )
        .route("/admin/items", post(routes::admin::list_item::<S>))
        .route("/admin/items/{id}/restock", post(routes::admin::restock::<S>))
        .route("/admin/items/{id}/price", post(routes::admin::change_price::<S>))
        .route("/payments/webhook", post(routes::payments::webhook::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the shared state over `store` and brings the read model up to date
/// with whatever the store already holds.
pub async fn create_state<S: EventStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<Arc<AppState<S>>, ApiError> {
    let state = Arc::new(AppState::new(store, config));
    state.refresh_read_model().await?;
    Ok(state)
}
