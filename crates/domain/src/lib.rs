//! Domain layer of the order-fulfillment engine.
//!
//! - [`Aggregate`] and [`DomainEvent`] for event-sourced entities
//! - [`CommandHandler`] and [`UnitOfWork`] for loading and committing them
//! - carts, the inventory ledger and orders, each with its service
//! - [`CheckoutService`], which turns a cart into an order atomically

pub mod actor;
pub mod aggregate;
pub mod cart;
pub mod checkout;
pub mod command;
pub mod error;
pub mod inventory;
pub mod order;
pub mod retry;
pub mod value_objects;

pub use actor::Actor;
pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use cart::{Cart, CartError, CartLine, CartService};
pub use checkout::CheckoutService;
pub use command::{CommandHandler, CommandResult, UnitOfWork};
pub use error::DomainError;
pub use inventory::{InventoryError, InventoryItem, InventoryService};
pub use order::{
    Order, OrderCancelledData, OrderError, OrderEvent, OrderLine, OrderPaidData, OrderPlacedData,
    OrderService, OrderStatus, PaymentConfirmation, PaymentSessionOpenedData,
};
pub use retry::{DEFAULT_CONFLICT_RETRY_LIMIT, RetryPolicy};
pub use value_objects::{Money, ProductId};
