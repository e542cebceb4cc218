//! Applying verified payment notifications to orders.

use common::AggregateId;
use domain::{OrderService, OrderStatus, PaymentConfirmation, RetryPolicy};
use event_store::EventStore;

use crate::error::{PaymentError, Result};
use crate::notification::WebhookNotification;
use crate::signature::WebhookVerifier;

/// What a verified notification did. Every outcome is acknowledged to the
/// provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order is now PAID.
    Applied { order_id: AggregateId },

    /// A duplicate of a notification that was already applied.
    AlreadyPaid { order_id: AggregateId },

    /// The notification names no order we know.
    UnknownOrder,

    /// Not a checkout completion.
    Ignored { event_type: String },

    /// The order was cancelled (or moved on) before the payment arrived.
    NotPayable {
        order_id: AggregateId,
        status: OrderStatus,
    },

    /// Correctly signed, but not a notification we can read. Redelivery
    /// would not change that.
    Malformed { reason: String },
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied { .. } => "applied",
            WebhookOutcome::AlreadyPaid { .. } => "already_paid",
            WebhookOutcome::UnknownOrder => "unknown_order",
            WebhookOutcome::Ignored { .. } => "ignored",
            WebhookOutcome::NotPayable { .. } => "not_payable",
            WebhookOutcome::Malformed { .. } => "malformed",
        }
    }
}

/// Verifies provider notifications and marks their orders as paid, once.
///
/// Duplicate, late and replayed notifications are safe: the order's status
/// decides whether anything is written, and the write is guarded by the
/// order's version. Inventory is never touched.
pub struct PaymentConfirmationHandler<S: EventStore> {
    verifier: WebhookVerifier,
    orders: OrderService<S>,
}

impl<S: EventStore + Clone> PaymentConfirmationHandler<S> {
    pub fn new(store: S, retry: RetryPolicy, verifier: WebhookVerifier) -> Self {
        Self {
            verifier,
            orders: OrderService::new(store, retry),
        }
    }
}

impl<S: EventStore> PaymentConfirmationHandler<S> {
    /// Handles one webhook delivery.
    ///
    /// Fails only when the delivery cannot be trusted or the store is
    /// unavailable; the provider will retry those. Anything signed correctly
    /// is acknowledged.
    #[tracing::instrument(skip(self, signature, body), fields(body_len = body.len()))]
    pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<WebhookOutcome> {
        let result = self.process(signature, body).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(PaymentError::MissingSecret | PaymentError::InvalidSignature { .. }) => "rejected",
            Err(_) => "error",
        };
        metrics::counter!("payment_notifications_total", "outcome" => label).increment(1);

        match &result {
            Ok(_) => tracing::info!(outcome = label, "payment notification handled"),
            Err(e) => tracing::warn!(outcome = label, error = %e, "payment notification refused"),
        }
        result
    }

    async fn process(&self, signature: Option<&str>, body: &[u8]) -> Result<WebhookOutcome> {
        self.verifier.verify(signature, body)?;
        let notification = match WebhookNotification::parse(body) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(error = %e, "signed payment notification could not be read");
                return Ok(WebhookOutcome::Malformed {
                    reason: e.to_string(),
                });
            }
        };

        if !notification.is_checkout_completed() {
            return Ok(WebhookOutcome::Ignored {
                event_type: notification.event_type,
            });
        }
        let Some(order_id) = notification.order_id() else {
            return Ok(WebhookOutcome::UnknownOrder);
        };

        let outcome = match self
            .orders
            .confirm_payment(order_id, notification.session_id())
            .await?
        {
            PaymentConfirmation::Applied(_) => WebhookOutcome::Applied { order_id },
            PaymentConfirmation::AlreadyPaid(_) => WebhookOutcome::AlreadyPaid { order_id },
            PaymentConfirmation::UnknownOrder => WebhookOutcome::UnknownOrder,
            PaymentConfirmation::NotPayable { status } => {
                tracing::warn!(%order_id, %status, "payment arrived for an order that cannot be paid");
                WebhookOutcome::NotPayable { order_id, status }
            }
        };
        Ok(outcome)
    }
}
