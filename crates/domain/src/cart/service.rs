//! Cart operations for the owning customer.

use common::CustomerId;
use event_store::EventStore;

use crate::actor::Actor;
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::inventory::{InventoryError, InventoryItem};
use crate::retry::RetryPolicy;
use crate::value_objects::ProductId;

use super::{Cart, CartLine};

pub struct CartService<S: EventStore> {
    carts: CommandHandler<S, Cart>,
    inventory: CommandHandler<S, InventoryItem>,
    retry: RetryPolicy,
}

impl<S: EventStore + Clone> CartService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            inventory: CommandHandler::new(store),
            retry,
        }
    }

    /// The customer's cart; empty if they never added anything.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, customer: CustomerId) -> Result<Cart, DomainError> {
        self.carts.load(customer.cart_stream()).await
    }

    /// Adds units of an item, checking the new line total against what is
    /// available now. Returns the updated line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer: CustomerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartLine, DomainError> {
        let actor = Actor::Customer(customer);
        let actor = &actor;

        let cart = self
            .retry
            .run("cart.add", move || async move {
                let available = self.available(product_id).await?;
                let result = self
                    .carts
                    .execute(customer.cart_stream(), actor, |cart| {
                        cart.add(customer, product_id.clone(), quantity, available)
                    })
                    .await?;
                Ok(result.aggregate)
            })
            .await?;

        cart.line(product_id)
            .ok_or_else(|| DomainError::not_found("Cart line", product_id))
    }

    /// Sets a line's quantity. Returns None when quantity 0 removed the line.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        customer: CustomerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartLine>, DomainError> {
        let actor = Actor::Customer(customer);
        let actor = &actor;

        let cart = self
            .retry
            .run("cart.set_quantity", move || async move {
                let available = if quantity == 0 {
                    0
                } else {
                    self.available(product_id).await?
                };
                let result = self
                    .carts
                    .execute(customer.cart_stream(), actor, |cart| {
                        cart.set_quantity(product_id.clone(), quantity, available)
                    })
                    .await?;
                Ok(result.aggregate)
            })
            .await?;

        Ok(cart.line(product_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer: CustomerId,
        product_id: &ProductId,
    ) -> Result<Cart, DomainError> {
        let actor = Actor::Customer(customer);
        let actor = &actor;

        self.retry
            .run("cart.remove", move || async move {
                let result = self
                    .carts
                    .execute(customer.cart_stream(), actor, |cart| {
                        cart.remove(product_id.clone())
                    })
                    .await?;
                Ok(result.aggregate)
            })
            .await
    }

    /// Drops every line from the customer's cart. Nothing was reserved, so
    /// stock is unaffected.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, customer: CustomerId) -> Result<Cart, DomainError> {
        let actor = Actor::Customer(customer);
        let actor = &actor;

        self.retry
            .run("cart.clear", move || async move {
                let result = self
                    .carts
                    .execute(customer.cart_stream(), actor, |cart| Ok(cart.empty()))
                    .await?;
                Ok(result.aggregate)
            })
            .await
    }

    async fn available(&self, product_id: &ProductId) -> Result<u32, DomainError> {
        self.inventory
            .load_existing(product_id.stream_id())
            .await?
            .map(|item| item.available())
            .ok_or_else(|| {
                InventoryError::NotListed {
                    product_id: product_id.clone(),
                }
                .into()
            })
    }
}
