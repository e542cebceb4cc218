//! Loading aggregates and recording their events.
//!
//! [`CommandHandler`] runs a command against one stream. [`UnitOfWork`]
//! stages events for several streams and commits them in one
//! [`append_streams`](EventStore::append_streams) call, each stream guarded by
//! the version it was loaded at.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, StreamAppend, Version,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::actor::Actor;
use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// Loads and writes one kind of aggregate.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from its snapshot and the events after it.
    ///
    /// A stream with no events yields `A::default()` at version 0.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => {
                let version = snapshot.version;
                let mut aggregate: A = snapshot.into_state()?;
                aggregate.set_version(version);
                aggregate
            }
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if its stream is empty.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    /// Runs `command_fn` against the current state and appends its events,
    /// expecting the stream to still be at the loaded version.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        actor: &Actor,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let mut uow = UnitOfWork::new(actor);
        uow.stage(aggregate_id, &aggregate, &events)?;
        uow.commit(&self.store).await?;

        aggregate.apply_committed(events.iter().cloned());
        let new_version = aggregate.version();

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Executes a command and saves a snapshot when one is due.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        actor: &Actor,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, actor, command_fn).await?;
        if !result.events.is_empty() {
            self.snapshot_if_due(aggregate_id, &result.aggregate).await;
        }
        Ok(result)
    }

    /// Saves a snapshot of a committed aggregate if its version is on an
    /// interval boundary.
    ///
    /// The events are already committed, so a failed snapshot is only logged.
    pub async fn snapshot_if_due(&self, aggregate_id: AggregateId, aggregate: &A) {
        if !aggregate.should_snapshot() {
            return;
        }

        let result = match Snapshot::from_state(
            aggregate_id,
            A::aggregate_type(),
            aggregate.version(),
            aggregate,
        ) {
            Ok(snapshot) => self.store.save_snapshot(snapshot).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(%aggregate_id, error = %e, "failed to save snapshot");
        }
    }
}

/// Events for several streams, committed together or not at all.
pub struct UnitOfWork {
    actor: String,
    appends: Vec<StreamAppend>,
}

impl UnitOfWork {
    pub fn new(actor: &Actor) -> Self {
        Self {
            actor: actor.to_string(),
            appends: Vec::new(),
        }
    }

    /// Stages `events` for the stream of `aggregate`, guarded by the version
    /// the aggregate was loaded at. An empty event list stages nothing.
    pub fn stage<A: Aggregate>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate: &A,
        events: &[A::Event],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let current_version = aggregate.version();
        let mut version = current_version;
        let mut envelopes = Vec::with_capacity(events.len());
        for event in events {
            version = version.next();
            envelopes.push(
                EventEnvelope::builder()
                    .aggregate_id(aggregate_id)
                    .aggregate_type(A::aggregate_type())
                    .event_type(event.event_type())
                    .version(version)
                    .payload(event)?
                    .actor(self.actor.as_str())
                    .build(),
            );
        }

        self.appends.push(StreamAppend::new(
            envelopes,
            AppendOptions::expect_version(current_version),
        ));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.appends.is_empty()
    }

    /// Number of streams staged so far.
    pub fn stream_count(&self) -> usize {
        self.appends.len()
    }

    /// Appends every staged stream in one store transaction.
    ///
    /// Fails with a conflict, writing nothing, if any stream moved past the
    /// version it was loaded at.
    pub async fn commit<S: EventStore + ?Sized>(self, store: &S) -> Result<(), DomainError> {
        if self.appends.is_empty() {
            return Ok(());
        }
        store.append_streams(self.appends).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { id: AggregateId },
        Added { amount: i32 },
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Added { .. } => "TallyAdded",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Tally {
        id: Option<AggregateId>,
        total: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("negative amount: {0}")]
    struct NegativeAmount(i32);

    impl From<NegativeAmount> for DomainError {
        fn from(e: NegativeAmount) -> Self {
            DomainError::not_found("Tally", e)
        }
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = NegativeAmount;

        fn aggregate_type() -> &'static str {
            "Tally"
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
                TallyEvent::Opened { id } => self.id = Some(id),
                TallyEvent::Added { amount } => self.total += amount,
            }
        }
    }

    impl SnapshotCapable for Tally {
        fn snapshot_interval() -> usize {
            3
        }
    }

    fn add(tally: &Tally, id: AggregateId, amount: i32) -> Result<Vec<TallyEvent>, NegativeAmount> {
        if amount < 0 {
            return Err(NegativeAmount(amount));
        }
        let mut events = Vec::new();
        if !tally.exists() {
            events.push(TallyEvent::Opened { id });
        }
        events.push(TallyEvent::Added { amount });
        Ok(events)
    }

    fn admin() -> Actor {
        Actor::Admin("test".into())
    }

    #[tokio::test]
    async fn execute_records_events_with_actor() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        let result = handler
            .execute(id, &admin(), |t| add(t, id, 5))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.total, 5);

        let stored = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|e| e.actor() == Some("admin:test")));
    }

    #[tokio::test]
    async fn execute_rejected_command_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        let result = handler.execute(id, &admin(), |t| add(t, id, -1)).await;

        assert!(result.is_err());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_empty_streams() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        assert!(handler.load_existing(id).await.unwrap().is_none());
        handler.execute(id, &admin(), |t| add(t, id, 1)).await.unwrap();
        assert_eq!(handler.load_existing(id).await.unwrap().unwrap().total, 1);
    }

    #[tokio::test]
    async fn snapshot_is_taken_on_interval_and_used_on_load() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        // Opened + Added (v2), then Added (v3) lands on the interval.
        handler
            .execute_with_snapshot(id, &admin(), |t| add(t, id, 1))
            .await
            .unwrap();
        handler
            .execute_with_snapshot(id, &admin(), |t| add(t, id, 2))
            .await
            .unwrap();

        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(3));

        handler.execute(id, &admin(), |t| add(t, id, 4)).await.unwrap();
        let tally = handler.load(id).await.unwrap();
        assert_eq!(tally.total, 7);
        assert_eq!(tally.version(), Version::new(4));
    }

    #[tokio::test]
    async fn unit_of_work_commits_streams_together() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let a = AggregateId::new();
        let b = AggregateId::new();

        let tally_a = handler.load(a).await.unwrap();
        let tally_b = handler.load(b).await.unwrap();

        let mut uow = UnitOfWork::new(&admin());
        uow.stage(a, &tally_a, &add(&tally_a, a, 1).unwrap()).unwrap();
        uow.stage(b, &tally_b, &add(&tally_b, b, 2).unwrap()).unwrap();
        uow.stage::<Tally>(b, &tally_b, &[]).unwrap();
        assert_eq!(uow.stream_count(), 2);
        uow.commit(&store).await.unwrap();

        assert_eq!(handler.load(a).await.unwrap().total, 1);
        assert_eq!(handler.load(b).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn unit_of_work_with_stale_stream_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let a = AggregateId::new();
        let b = AggregateId::new();

        let tally_a = handler.load(a).await.unwrap();
        let stale_b = handler.load(b).await.unwrap();
        // Someone else writes b after we read it.
        handler.execute(b, &admin(), |t| add(t, b, 9)).await.unwrap();

        let mut uow = UnitOfWork::new(&admin());
        uow.stage(a, &tally_a, &add(&tally_a, a, 1).unwrap()).unwrap();
        uow.stage(b, &stale_b, &add(&stale_b, b, 1).unwrap()).unwrap();
        let err = uow.commit(&store).await.unwrap_err();

        assert!(err.is_conflict());
        assert!(handler.load_existing(a).await.unwrap().is_none());
        assert_eq!(handler.load(b).await.unwrap().total, 9);
    }
}
