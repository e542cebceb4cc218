//! Payment provider seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::Money;
use tokio::sync::Mutex;

use crate::error::{PaymentError, Result};

/// What the provider needs to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: AggregateId,
    pub amount: Money,
    pub success_url: String,
    pub cancel_url: String,
}

/// A session opened by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,

    /// Where the customer is sent to pay.
    pub url: String,
}

/// Opens checkout sessions with an external payment provider.
///
/// The provider must echo `order_id` back in the completion notification's
/// metadata.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest)
    -> Result<CheckoutSession>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        (**self).create_checkout_session(request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<String, CheckoutSessionRequest>,
    next_id: u32,
    fail_on_create: bool,
}

/// Gateway that hands out sequential session ids without calling anyone.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    base_url: String,
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Session urls are `{base_url}/{session_id}`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Arc::default(),
        }
    }

    /// Makes the next session creations fail as a provider outage would.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.lock().await.fail_on_create = fail;
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// The request a session was opened for.
    pub async fn session(&self, session_id: &str) -> Option<CheckoutSessionRequest> {
        self.state.lock().await.sessions.get(session_id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let mut state = self.state.lock().await;
        if state.fail_on_create {
            return Err(PaymentError::Gateway("provider unavailable".to_string()));
        }

        state.next_id += 1;
        let session_id = format!("cs_test_{:04}", state.next_id);
        state.sessions.insert(session_id.clone(), request);

        Ok(CheckoutSession {
            url: format!("{}/{session_id}", self.base_url),
            session_id,
        })
    }
}
