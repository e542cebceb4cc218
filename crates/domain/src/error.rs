//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::inventory::InventoryError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Checkout was requested for a missing or empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The referenced order, item or cart line does not exist, or belongs to
    /// someone else.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Every attempt lost an optimistic concurrency race.
    #[error("{operation} kept conflicting with concurrent writers after {attempts} attempts")]
    Conflict {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the unit of work lost a race and may be retried from a
    /// fresh read.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
