//! Catalog-facing operations on the inventory ledger.

use event_store::EventStore;

use crate::actor::Actor;
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::retry::RetryPolicy;
use crate::value_objects::{Money, ProductId};

use super::{InventoryError, InventoryItem};

/// Lists products and adjusts their stock and price.
///
/// Reservations and releases do not go through here: they are staged by
/// checkout and cancellation in the same unit of work as the order change.
pub struct InventoryService<S: EventStore> {
    handler: CommandHandler<S, InventoryItem>,
    retry: RetryPolicy,
}

impl<S: EventStore> InventoryService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            handler: CommandHandler::new(store),
            retry,
        }
    }

    /// Loads an item, or None if the SKU was never listed.
    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, product_id: &ProductId) -> Result<Option<InventoryItem>, DomainError> {
        self.handler.load_existing(product_id.stream_id()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_item(
        &self,
        actor: &Actor,
        product_id: &ProductId,
        name: &str,
        unit_price: Money,
        quantity: u32,
    ) -> Result<InventoryItem, DomainError> {
        let result = self
            .handler
            .execute(product_id.stream_id(), actor, |item| {
                item.list(product_id.clone(), name, unit_price, quantity)
            })
            .await;

        match result {
            Ok(result) => {
                tracing::info!(%product_id, quantity, %unit_price, "item listed");
                Ok(result.aggregate)
            }
            // Lost the race to another listing of the same SKU.
            Err(e) if e.is_conflict() => Err(InventoryError::AlreadyListed {
                product_id: product_id.clone(),
            }
            .into()),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn restock(
        &self,
        actor: &Actor,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryItem, DomainError> {
        self.retry
            .run("inventory.restock", move || async move {
                self.ensure_listed(product_id).await?;
                let result = self
                    .handler
                    .execute_with_snapshot(product_id.stream_id(), actor, |item| {
                        item.restock(quantity)
                    })
                    .await?;
                Ok(result.aggregate)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_price(
        &self,
        actor: &Actor,
        product_id: &ProductId,
        new_price: Money,
    ) -> Result<InventoryItem, DomainError> {
        self.retry
            .run("inventory.change_price", move || async move {
                self.ensure_listed(product_id).await?;
                let result = self
                    .handler
                    .execute_with_snapshot(product_id.stream_id(), actor, |item| {
                        item.change_price(new_price)
                    })
                    .await?;
                Ok(result.aggregate)
            })
            .await
    }

    async fn ensure_listed(&self, product_id: &ProductId) -> Result<(), DomainError> {
        if self.get_item(product_id).await?.is_none() {
            return Err(InventoryError::NotListed {
                product_id: product_id.clone(),
            }
            .into());
        }
        Ok(())
    }
}
