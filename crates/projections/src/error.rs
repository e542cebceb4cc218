//! Projection error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Errors raised while feeding events to read models.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading the log failed.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A stored payload does not match the event type it claims.
    #[error("Cannot decode stored event: {0}")]
    Deserialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
