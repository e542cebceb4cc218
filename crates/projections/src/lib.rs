//! Read models for order listings.
//!
//! - [`Projection`] folds stored events into a read model
//! - [`ProjectionProcessor`] feeds events from the store to projections
//! - [`OrderSummaryView`] answers "my orders" and the admin order list

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{OrderSummary, OrderSummaryLine, OrderSummaryView};
