//! Read model views.

pub mod order_summary;

pub use order_summary::{OrderSummary, OrderSummaryLine, OrderSummaryView};
