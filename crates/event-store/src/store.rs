use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

/// Options for appending events to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected current version of the stream. If None, no version check is
    /// performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the stream to be at `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to be empty.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Events for one stream inside a multi-stream append.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self { events, options }
    }

    /// The stream this append targets.
    ///
    /// Only meaningful after [`validate_batch`] has accepted the append.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// All implementations must be thread-safe and must make
/// [`append_streams`](EventStore::append_streams) atomic: either every stream
/// in the batch is written or none is.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to several streams in one transaction.
    ///
    /// Each stream's `expected_version` is checked against its committed
    /// version. If any check fails the whole batch is rejected with
    /// `ConcurrencyConflict` and nothing is written. Streams are written in
    /// ascending `AggregateId` order regardless of batch order.
    ///
    /// Returns the new version of each stream, in batch order.
    async fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let versions = self
            .append_streams(vec![StreamAppend::new(events, options)])
            .await?;
        versions
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::InvalidAppend("no stream was written".to_string()))
    }

    /// Retrieves all events for a stream, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves the events of a stream with version >= `from_version`.
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams stored events in commit order, leaving out the first `skip`.
    ///
    /// A reader that remembers how many events it has consumed resumes from
    /// that count instead of re-reading the whole log.
    async fn stream_events_from(&self, skip: u64) -> Result<EventStream>;

    /// Streams every stored event in commit order.
    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_from(0).await
    }

    /// Gets the current version of a stream, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Saves a snapshot, replacing any previous one for the stream.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the latest snapshot for a stream.
    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Lets a process pick its store at start-up and share it as
/// `Arc<dyn EventStore>`.
#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        (**self).append_streams(batch).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        (**self).get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        (**self)
            .get_events_for_aggregate_from_version(aggregate_id, from_version)
            .await
    }

    async fn stream_events_from(&self, skip: u64) -> Result<EventStream> {
        (**self).stream_events_from(skip).await
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        (**self).get_aggregate_version(aggregate_id).await
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        (**self).save_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        (**self).get_snapshot(aggregate_id).await
    }
}

/// Convenience methods available on every event store.
#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads a stream, starting from its snapshot when one exists.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events_for_aggregate(aggregate_id).await?;
            Ok((None, events))
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks a multi-stream batch before any store touches it.
///
/// Every append must be non-empty, target one stream with one aggregate type,
/// carry sequential versions, and start right after its expected version when
/// one is given. A stream may appear only once per batch.
pub fn validate_batch(batch: &[StreamAppend]) -> Result<()> {
    if batch.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(batch.len());
    for append in batch {
        let Some(first) = append.events.first() else {
            return Err(EventStoreError::InvalidAppend(
                "cannot append an empty event list".to_string(),
            ));
        };

        if !seen.insert(first.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears more than once in the batch",
                first.aggregate_id
            )));
        }

        if let Some(expected) = append.options.expected_version
            && first.version != expected.next()
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "first event of stream {} has version {}, expected {}",
                first.aggregate_id,
                first.version,
                expected.next()
            )));
        }

        let mut expected_version = first.version;
        for event in append.events.iter().skip(1) {
            if event.aggregate_id != first.aggregate_id {
                return Err(EventStoreError::InvalidAppend(
                    "all events of an append must target the same stream".to_string(),
                ));
            }
            if event.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::InvalidAppend(
                    "all events of an append must have the same aggregate type".to_string(),
                ));
            }
            expected_version = expected_version.next();
            if event.version != expected_version {
                return Err(EventStoreError::InvalidAppend(format!(
                    "event versions must be sequential: expected {}, got {}",
                    expected_version, event.version
                )));
            }
        }
    }

    Ok(())
}
