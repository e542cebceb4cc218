//! Payment error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while opening sessions or handling webhooks.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No webhook secret is configured; every notification is refused.
    #[error("Webhook secret is not configured")]
    MissingSecret,

    #[error("Invalid webhook signature: {reason}")]
    InvalidSignature { reason: &'static str },

    /// The signature was valid but the body is not a notification.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl PaymentError {
    pub(crate) fn invalid_signature(reason: &'static str) -> Self {
        PaymentError::InvalidSignature { reason }
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
