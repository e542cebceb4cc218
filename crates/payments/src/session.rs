//! Opening payment sessions for PENDING orders.

use common::{AggregateId, CustomerId};
use domain::{OrderService, RetryPolicy};
use event_store::EventStore;

use crate::error::Result;
use crate::gateway::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};

pub struct PaymentSessionService<S: EventStore, G: PaymentGateway> {
    orders: OrderService<S>,
    gateway: G,
}

impl<S: EventStore + Clone, G: PaymentGateway> PaymentSessionService<S, G> {
    pub fn new(store: S, retry: RetryPolicy, gateway: G) -> Self {
        Self {
            orders: OrderService::new(store, retry),
            gateway,
        }
    }
}

impl<S: EventStore, G: PaymentGateway> PaymentSessionService<S, G> {
    /// Opens a provider session for the order's frozen total and records it
    /// on the order.
    ///
    /// Only the owner may pay, and only while the order is PENDING. Opening
    /// another session replaces the recorded one.
    #[tracing::instrument(skip(self))]
    pub async fn open_session(
        &self,
        customer: CustomerId,
        order_id: AggregateId,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let order = self.orders.ensure_payable(customer, order_id).await?;

        let session = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                order_id,
                amount: order.total(),
                success_url: success_url.to_string(),
                cancel_url: cancel_url.to_string(),
            })
            .await?;

        self.orders
            .record_payment_session(customer, order_id, &session.session_id)
            .await?;

        metrics::counter!("payment_sessions_opened_total").increment(1);
        tracing::info!(%order_id, session_id = %session.session_id, "payment session opened");
        Ok(session)
    }
}
