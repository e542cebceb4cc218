//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded on a stream, named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// The name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced consistency boundary.
///
/// State is rebuilt by replaying events through [`apply`](Aggregate::apply);
/// commands are plain methods that inspect state and return the events to
/// record, or an error. Every write to the stream is guarded by
/// [`version`](Aggregate::version).
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// The stream kind ("Cart", "InventoryItem", "Order").
    fn aggregate_type() -> &'static str;

    /// None until the first event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Version of the last applied event; 0 for a stream with no events.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Folds one event into the state.
    ///
    /// Must be deterministic and infallible: the event already happened.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Applies events just appended after the current version and advances
    /// the version past them.
    fn apply_committed(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        let mut version = self.version();
        for event in events {
            self.apply(event);
            version = version.next();
        }
        self.set_version(version);
    }

    /// Returns true once the aggregate has at least one event.
    fn exists(&self) -> bool {
        self.id().is_some()
    }
}

/// Aggregates whose streams grow long enough to be worth snapshotting.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId },
        Incremented { by: u32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Incremented { .. } => "CounterIncremented",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        total: u32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => self.id = Some(id),
                CounterEvent::Incremented { by } => self.total += by,
            }
        }
    }

    impl SnapshotCapable for Counter {
        fn snapshot_interval() -> usize {
            10
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let mut counter = Counter::default();
        assert!(!counter.exists());

        counter.apply_events(vec![
            CounterEvent::Opened {
                id: AggregateId::new(),
            },
            CounterEvent::Incremented { by: 2 },
            CounterEvent::Incremented { by: 3 },
        ]);

        assert!(counter.exists());
        assert_eq!(counter.total, 5);
    }

    #[test]
    fn snapshot_due_on_interval_boundaries() {
        let mut counter = Counter::default();
        assert!(!counter.should_snapshot());

        counter.set_version(Version::new(10));
        assert!(counter.should_snapshot());

        counter.set_version(Version::new(11));
        assert!(!counter.should_snapshot());
    }
}
