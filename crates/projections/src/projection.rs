//! The projection seam and read positions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_store::EventEnvelope;

use crate::Result;

/// How far into the event log a projection has read.
///
/// The log is read in commit order, so a count of consumed events is enough
/// to resume. The timestamp of the last consumed event shows how stale the
/// read model is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_processed: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// The position once `event` has been consumed.
    pub fn after(&self, event: &EventEnvelope) -> Self {
        Self {
            events_processed: self.events_processed + 1,
            last_event_at: Some(event.timestamp),
        }
    }

    /// Whether this position has consumed the event at 1-based `index` of the log.
    pub fn has_seen(&self, index: u64) -> bool {
        index <= self.events_processed
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_event_at {
            Some(at) => write!(f, "position({} @ {})", self.events_processed, at.to_rfc3339()),
            None => write!(f, "position({})", self.events_processed),
        }
    }
}

/// Folds stored events into a read model.
///
/// Events arrive in commit order. `position` counts every event handed to
/// `handle`, including the ones the projection has no interest in.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops everything, back to position zero.
    async fn reset(&self) -> Result<()>;
}
