//! Event store for the fulfillment engine.
//!
//! Every cart, inventory item and order is a stream of events guarded by a
//! version number. [`EventStore::append_streams`] writes to several streams in
//! one transaction, each guarded by its own expected version, which is what
//! makes checkout and cancellation all-or-nothing.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{ACTOR_METADATA_KEY, EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream, StreamAppend};
