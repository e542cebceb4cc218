//! Shared application state.

use domain::{CartService, CheckoutService, InventoryService, OrderService, RetryPolicy};
use event_store::EventStore;
use payments::{
    InMemoryPaymentGateway, PaymentConfirmationHandler, PaymentSessionService, WebhookVerifier,
};
use projections::{OrderSummaryView, ProjectionProcessor};

use crate::config::Config;
use crate::error::ApiError;

/// Services over one event store, shared by every handler.
pub struct AppState<S: EventStore> {
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub inventory: InventoryService<S>,
    pub payment_sessions: PaymentSessionService<S, InMemoryPaymentGateway>,
    pub payment_webhooks: PaymentConfirmationHandler<S>,
    pub gateway: InMemoryPaymentGateway,
    pub order_summaries: OrderSummaryView,
    pub projection_processor: ProjectionProcessor<S>,
}

impl<S: EventStore + Clone> AppState<S> {
    pub fn new(store: S, config: &Config) -> Self {
        let retry = RetryPolicy::new(config.conflict_retry_limit);
        let gateway = InMemoryPaymentGateway::new(config.checkout_base_url.as_str());
        let verifier =
            WebhookVerifier::new(config.webhook_secret.clone(), config.webhook_tolerance_secs);
        if !verifier.has_secret() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET is not set; payment webhooks will be refused");
        }

        let order_summaries = OrderSummaryView::new();
        let mut projection_processor = ProjectionProcessor::new(store.clone());
        projection_processor.register(Box::new(order_summaries.clone()));

        Self {
            carts: CartService::new(store.clone(), retry),
            checkout: CheckoutService::new(store.clone(), retry),
            orders: OrderService::new(store.clone(), retry),
            inventory: InventoryService::new(store.clone(), retry),
            payment_sessions: PaymentSessionService::new(store.clone(), retry, gateway.clone()),
            payment_webhooks: PaymentConfirmationHandler::new(store, retry, verifier),
            gateway,
            order_summaries,
            projection_processor,
        }
    }
}

impl<S: EventStore> AppState<S> {
    /// Brings the order read model up to date with the store.
    pub async fn refresh_read_model(&self) -> Result<(), ApiError> {
        self.projection_processor.run_catch_up().await?;
        Ok(())
    }
}
