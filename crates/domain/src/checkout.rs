//! Turning a cart into an order.
//!
//! One checkout is one [`UnitOfWork`]: the new order stream, a reservation on
//! every item in the cart, and the cleared cart are appended together, each
//! stream guarded by the version it was read at. A concurrent change to any
//! of them fails the commit and the whole checkout is retried from a fresh
//! read, so stock can never be reserved twice and a failed checkout leaves
//! nothing behind.

use std::time::Instant;

use common::{AggregateId, CustomerId};
use event_store::EventStore;

use crate::actor::Actor;
use crate::aggregate::Aggregate;
use crate::cart::Cart;
use crate::command::{CommandHandler, UnitOfWork};
use crate::error::DomainError;
use crate::inventory::{InventoryError, InventoryEvent, InventoryItem};
use crate::order::{Order, OrderLine};
use crate::retry::RetryPolicy;

pub struct CheckoutService<S: EventStore> {
    carts: CommandHandler<S, Cart>,
    inventory: CommandHandler<S, InventoryItem>,
    orders: CommandHandler<S, Order>,
    retry: RetryPolicy,
}

impl<S: EventStore + Clone> CheckoutService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            inventory: CommandHandler::new(store.clone()),
            orders: CommandHandler::new(store),
            retry,
        }
    }
}

impl<S: EventStore> CheckoutService<S> {
    /// Converts the customer's whole cart into a PENDING order.
    ///
    /// Items are reserved in product id order at their current price. Fails
    /// with `EmptyCart` for an empty cart and with `InsufficientStock` naming
    /// the first item that cannot be covered.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(
        &self,
        customer: CustomerId,
        shipping_address: &str,
    ) -> Result<Order, DomainError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let actor = Actor::Customer(customer);
        let actor = &actor;
        let order_id = AggregateId::new();

        let result = self
            .retry
            .run("checkout", move || async move {
                self.attempt(actor, customer, order_id, shipping_address)
                    .await
            })
            .await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        let order = result?;
        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            %order_id,
            %customer,
            lines = order.lines().len(),
            total = %order.total(),
            "order placed"
        );
        Ok(order)
    }

    async fn attempt(
        &self,
        actor: &Actor,
        customer: CustomerId,
        order_id: AggregateId,
        shipping_address: &str,
    ) -> Result<Order, DomainError> {
        let cart_id = customer.cart_stream();
        let cart = self.carts.load(cart_id).await?;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let mut uow = UnitOfWork::new(actor);
        let mut lines = Vec::new();
        let mut reserved: Vec<(InventoryItem, Vec<InventoryEvent>)> = Vec::new();

        for line in cart.lines() {
            let stream_id = line.product_id.stream_id();
            let item = self.inventory.load_existing(stream_id).await?.ok_or_else(|| {
                InventoryError::NotListed {
                    product_id: line.product_id.clone(),
                }
            })?;

            let events = item.try_reserve(order_id, line.quantity)?;
            uow.stage(stream_id, &item, &events)?;

            lines.push(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: item.unit_price(),
            });
            reserved.push((item, events));
        }

        let mut order = Order::default();
        let order_events = order.place(order_id, customer, lines, shipping_address)?;
        uow.stage(order_id, &order, &order_events)?;

        let cart_events = cart.clear(order_id)?;
        uow.stage(cart_id, &cart, &cart_events)?;

        tracing::debug!(%order_id, streams = uow.stream_count(), "committing checkout");
        uow.commit(self.orders.store()).await?;

        for (mut item, events) in reserved {
            item.apply_committed(events);
            if let Some(product_id) = item.product_id() {
                self.inventory
                    .snapshot_if_due(product_id.stream_id(), &item)
                    .await;
            }
        }

        order.apply_committed(order_events);
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartService;
    use crate::inventory::InventoryService;
    use crate::order::OrderStatus;
    use crate::value_objects::{Money, ProductId};
    use event_store::InMemoryEventStore;

    struct Shop {
        store: InMemoryEventStore,
        inventory: InventoryService<InMemoryEventStore>,
        carts: CartService<InMemoryEventStore>,
        checkout: CheckoutService<InMemoryEventStore>,
    }

    impl Shop {
        fn new() -> Self {
            let store = InMemoryEventStore::new();
            let retry = RetryPolicy::default();
            Self {
                inventory: InventoryService::new(store.clone(), retry),
                carts: CartService::new(store.clone(), retry),
                checkout: CheckoutService::new(store.clone(), retry),
                store,
            }
        }

        async fn list(&self, sku: &str, cents: i64, stock: u32) -> ProductId {
            let sku = ProductId::new(sku);
            self.inventory
                .list_item(
                    &Actor::Admin("ops".into()),
                    &sku,
                    "Widget",
                    Money::from_cents(cents),
                    stock,
                )
                .await
                .unwrap();
            sku
        }

        async fn available(&self, sku: &ProductId) -> u32 {
            self.inventory.get_item(sku).await.unwrap().unwrap().available()
        }
    }

    #[tokio::test]
    async fn checkout_reserves_stock_and_clears_cart() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 5).await;
        let b = shop.list("B", 250, 2).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &b, 1).await.unwrap();
        shop.carts.add_item(customer, &a, 3).await.unwrap();

        let order = shop.checkout.place_order(customer, "1 Main St").await.unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total().cents(), 550);
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[0].product_id, a);
        assert_eq!(shop.available(&a).await, 2);
        assert_eq!(shop.available(&b).await, 1);
        assert!(shop.carts.get_cart(customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_events_share_one_actor() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 5).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &a, 1).await.unwrap();

        let order = shop.checkout.place_order(customer, "1 Main St").await.unwrap();

        let expected = format!("customer:{customer}");
        for stream in [order.id().unwrap(), a.stream_id(), customer.cart_stream()] {
            let events = shop.store.get_events_for_aggregate(stream).await.unwrap();
            let last = events.last().unwrap();
            assert_eq!(last.actor(), Some(expected.as_str()));
        }
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let shop = Shop::new();
        let result = shop.checkout.place_order(CustomerId::new(), "1 Main St").await;
        assert!(matches!(result, Err(DomainError::EmptyCart)));
    }

    #[tokio::test]
    async fn second_checkout_of_same_cart_is_empty() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 5).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &a, 1).await.unwrap();

        shop.checkout.place_order(customer, "1 Main St").await.unwrap();
        let result = shop.checkout.place_order(customer, "1 Main St").await;
        assert!(matches!(result, Err(DomainError::EmptyCart)));
        assert_eq!(shop.available(&a).await, 4);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_everything_untouched() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 5).await;
        let b = shop.list("B", 100, 5).await;
        let alice = CustomerId::new();
        let bob = CustomerId::new();

        shop.carts.add_item(alice, &a, 1).await.unwrap();
        shop.carts.add_item(alice, &b, 4).await.unwrap();
        shop.carts.add_item(bob, &b, 3).await.unwrap();
        shop.checkout.place_order(bob, "2 Side St").await.unwrap();
        let events_before = shop.store.event_count().await;

        match shop.checkout.place_order(alice, "1 Main St").await {
            Err(DomainError::Inventory(InventoryError::InsufficientStock {
                product_id,
                available,
                ..
            })) => {
                assert_eq!(product_id, b);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(shop.store.event_count().await, events_before);
        assert_eq!(shop.available(&a).await, 5);
        assert_eq!(shop.carts.get_cart(alice).await.unwrap().lines().len(), 2);
    }

    #[tokio::test]
    async fn price_is_locked_at_checkout() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 5).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &a, 2).await.unwrap();

        shop.inventory
            .change_price(&Actor::Admin("ops".into()), &a, Money::from_cents(150))
            .await
            .unwrap();
        let order = shop.checkout.place_order(customer, "1 Main St").await.unwrap();
        assert_eq!(order.total().cents(), 300);

        shop.inventory
            .change_price(&Actor::Admin("ops".into()), &a, Money::from_cents(999))
            .await
            .unwrap();
        let order_id = order.id().unwrap();
        let stored: Order = CommandHandler::new(shop.store.clone())
            .load(order_id)
            .await
            .unwrap();
        assert_eq!(stored.total().cents(), 300);
        assert_eq!(stored.lines()[0].unit_price.cents(), 150);
    }

    #[tokio::test]
    async fn missing_shipping_address_is_rejected() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 5).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &a, 1).await.unwrap();

        let result = shop.checkout.place_order(customer, " ").await;
        assert!(matches!(result, Err(DomainError::Order(_))));
        assert_eq!(shop.available(&a).await, 5);
    }

    #[tokio::test]
    async fn overflowing_total_fails_without_reserving() {
        let shop = Shop::new();
        let a = shop.list("A", i64::MAX / 2, 5).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &a, 3).await.unwrap();
        let events_before = shop.store.event_count().await;

        let result = shop.checkout.place_order(customer, "1 Main St").await;
        assert!(matches!(
            result,
            Err(DomainError::Order(crate::order::OrderError::TotalOverflow))
        ));
        assert_eq!(shop.store.event_count().await, events_before);
        assert_eq!(shop.available(&a).await, 5);
    }
}
