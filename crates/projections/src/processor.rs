//! Feeding stored events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Delivers events from an event store to projections, in commit order.
///
/// - Catch-up: replays the log, skipping what each projection has seen
/// - Single event delivery
/// - Rebuild: resets every projection and replays from scratch
///
/// Catch-up runs are serialized, so concurrent readers asking for a fresh
/// view never deliver the same event twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every event a projection has not seen yet. Reading starts
    /// after the prefix all projections have consumed. Returns the number of
    /// deliveries made.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let Some(start) = self.lowest_position().await else {
            return Ok(0);
        };
        let mut stream = self.store.stream_events_from(start).await?;
        let mut event_index: u64 = start;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            event_index += 1;

            for projection in &self.projections {
                if !projection.position().await.has_seen(event_index) {
                    projection.handle(&event).await?;
                    delivered += 1;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        if delivered > 0 {
            for projection in &self.projections {
                let position = projection.position().await;
                tracing::debug!(projection = projection.name(), %position, delivered, "caught up");
            }
        }
        Ok(delivered)
    }

    async fn lowest_position(&self) -> Option<u64> {
        let mut lowest = None;
        for projection in &self.projections {
            let seen = projection.position().await.events_processed;
            lowest = Some(lowest.map_or(seen, |l: u64| l.min(seen)));
        }
        lowest
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
