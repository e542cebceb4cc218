//! Parsing verified webhook bodies.

use common::AggregateId;
use serde::Deserialize;

use crate::error::Result;

/// The only notification type that settles an order.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// The parts of a provider notification this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub object: SessionObject,
}

/// The checkout session the notification is about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionObject {
    pub id: Option<String>,

    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionMetadata {
    pub order_id: Option<String>,
}

impl WebhookNotification {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// The order the session was opened for, if the metadata names one.
    pub fn order_id(&self) -> Option<AggregateId> {
        self.data.object.metadata.order_id.as_deref()?.parse().ok()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.data.object.id.as_deref()
    }
}
