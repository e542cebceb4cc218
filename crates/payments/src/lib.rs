//! Payments for the order-fulfillment engine.
//!
//! Customers open a session with the payment provider through
//! [`PaymentSessionService`]; the provider later reports completion through a
//! signed webhook, which [`PaymentConfirmationHandler`] verifies and applies
//! to the order exactly once.

pub mod confirmation;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod session;
pub mod signature;

pub use confirmation::{PaymentConfirmationHandler, WebhookOutcome};
pub use error::PaymentError;
pub use gateway::{
    CheckoutSession, CheckoutSessionRequest, InMemoryPaymentGateway, PaymentGateway,
};
pub use notification::{CHECKOUT_SESSION_COMPLETED, WebhookNotification};
pub use session::PaymentSessionService;
pub use signature::{DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, WebhookVerifier, sign_payload};
