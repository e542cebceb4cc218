use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{EventStore, EventStream, StreamAppend, validate_batch},
};

#[derive(Default)]
struct Log {
    /// Every event in commit order.
    events: Vec<EventEnvelope>,
    /// Current version per stream.
    versions: HashMap<AggregateId, Version>,
}

/// In-memory event store for tests and single-process deployments.
///
/// A batch is checked and written while holding the write lock, so concurrent
/// appends are linearized exactly as the unique `(aggregate_id, version)`
/// constraint linearizes them in PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut log = self.log.write().await;

        // Check every stream before writing any of them.
        for append in &batch {
            let first = &append.events[0];
            let current = log
                .versions
                .get(&first.aggregate_id)
                .copied()
                .unwrap_or(Version::initial());

            let expected = append.options.expected_version.unwrap_or(current);
            if current != expected || first.version != current.next() {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id,
                    expected,
                    actual: current,
                });
            }
        }

        let mut ordered: Vec<(usize, StreamAppend)> = batch.into_iter().enumerate().collect();
        ordered.sort_by_key(|(_, append)| append.events[0].aggregate_id);

        let mut new_versions = vec![Version::initial(); ordered.len()];
        for (index, append) in ordered {
            let aggregate_id = append.events[0].aggregate_id;
            let last = append
                .events
                .last()
                .map(|e| e.version)
                .unwrap_or(Version::initial());
            log.versions.insert(aggregate_id, last);
            log.events.extend(append.events);
            new_versions[index] = last;
        }

        Ok(new_versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn stream_events_from(&self, skip: u64) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let events: Vec<_> = log.events.get(skip..).unwrap_or_default().to_vec();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.versions.get(&aggregate_id).copied())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(&aggregate_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AppendOptions, EventStoreExt};

    fn create_test_event(aggregate_id: AggregateId, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("TestAggregate")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let version = store
            .append(
                vec![create_test_event(aggregate_id, 1, "TestEvent")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        assert_eq!(version, Version::first());

        let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_stale_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append_event(
                create_test_event(aggregate_id, 1, "Event1"),
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        // A second writer that also read version 0.
        let result = store
            .append_event(
                create_test_event(aggregate_id, 1, "Event1"),
                AppendOptions::expect_new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn unchecked_append_still_refuses_duplicate_versions() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append_event(create_test_event(aggregate_id, 1, "Event1"), AppendOptions::new())
            .await
            .unwrap();
        let result = store
            .append_event(create_test_event(aggregate_id, 1, "Event1"), AppendOptions::new())
            .await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn multi_stream_append_is_all_or_nothing() {
        let store = InMemoryEventStore::new();
        let order = AggregateId::new();
        let item = AggregateId::new();

        // The item stream already moved on to version 1.
        store
            .append_event(create_test_event(item, 1, "ItemListed"), AppendOptions::expect_new())
            .await
            .unwrap();

        let batch = vec![
            StreamAppend::new(
                vec![create_test_event(order, 1, "OrderPlaced")],
                AppendOptions::expect_new(),
            ),
            StreamAppend::new(
                vec![create_test_event(item, 1, "StockReserved")],
                AppendOptions::expect_new(),
            ),
        ];
        let result = store.append_streams(batch).await;

        assert!(result.unwrap_err().is_conflict());
        assert!(store.get_events_for_aggregate(order).await.unwrap().is_empty());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn multi_stream_append_returns_versions_in_batch_order() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let versions = store
            .append_streams(vec![
                StreamAppend::new(
                    vec![create_test_event(a, 1, "E"), create_test_event(a, 2, "E")],
                    AppendOptions::expect_new(),
                ),
                StreamAppend::new(vec![create_test_event(b, 1, "E")], AppendOptions::expect_new()),
            ])
            .await
            .unwrap();

        assert_eq!(versions, vec![Version::new(2), Version::new(1)]);
        assert_eq!(
            store.get_aggregate_version(a).await.unwrap(),
            Some(Version::new(2))
        );
    }

    #[tokio::test]
    async fn concurrent_writers_on_one_stream_admit_exactly_one() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_event(
                        create_test_event(aggregate_id, 1, "OrderCancelled"),
                        AppendOptions::expect_new(),
                    )
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn get_events_from_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let events = (1..=3)
            .map(|v| create_test_event(aggregate_id, v, "Event"))
            .collect();
        store.append(events, AppendOptions::new()).await.unwrap();

        let from_v2 = store
            .get_events_for_aggregate_from_version(aggregate_id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(from_v2.len(), 2);
        assert_eq!(from_v2[0].version, Version::new(2));
    }

    #[tokio::test]
    async fn stream_all_events_preserves_commit_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        store
            .append_event(create_test_event(second, 1, "A"), AppendOptions::new())
            .await
            .unwrap();
        store
            .append_event(create_test_event(first, 1, "B"), AppendOptions::new())
            .await
            .unwrap();

        let events: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
        let types: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap().event_type)
            .collect();
        assert_eq!(types, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn stream_events_from_resumes_after_consumed_prefix() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        for name in ["A", "B", "C"] {
            store
                .append_event(create_test_event(AggregateId::new(), 1, name), AppendOptions::new())
                .await
                .unwrap();
        }

        let types = |events: Vec<Result<EventEnvelope>>| -> Vec<String> {
            events.into_iter().map(|e| e.unwrap().event_type).collect()
        };
        let tail = store.stream_events_from(1).await.unwrap().collect().await;
        assert_eq!(types(tail), vec!["B", "C"]);

        let past_end = store.stream_events_from(10).await.unwrap().collect().await;
        assert!(types(past_end).is_empty());
    }

    #[tokio::test]
    async fn load_aggregate_starts_from_snapshot() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let events = (1..=4)
            .map(|v| create_test_event(aggregate_id, v, "Event"))
            .collect();
        store.append(events, AppendOptions::new()).await.unwrap();
        store
            .save_snapshot(
                Snapshot::from_state(
                    aggregate_id,
                    "TestAggregate",
                    Version::new(3),
                    &serde_json::json!({"n": 3}),
                )
                .unwrap(),
            )
            .await
            .unwrap();

        let (snapshot, tail) = store.load_aggregate(aggregate_id).await.unwrap();
        assert_eq!(snapshot.unwrap().version, Version::new(3));
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].version, Version::new(4));
    }
}
