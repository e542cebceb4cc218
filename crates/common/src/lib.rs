//! Identifiers shared by every crate in the fulfillment engine.

mod ids;

pub use ids::{AggregateId, CustomerId, StreamNamespace};
