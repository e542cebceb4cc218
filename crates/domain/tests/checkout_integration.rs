//! End-to-end checkout, cancellation and payment flows against the
//! in-memory store, including concurrent customers and administrators.

use std::sync::Arc;

use common::CustomerId;
use domain::{
    Actor, Aggregate, CartError, CartService, CheckoutService, DomainError, InventoryError,
    InventoryService, Money, Order, OrderError, OrderService, OrderStatus, PaymentConfirmation,
    ProductId, RetryPolicy,
};
use event_store::InMemoryEventStore;

/// Every service over one shared store.
struct Shop {
    inventory: InventoryService<InMemoryEventStore>,
    carts: CartService<InMemoryEventStore>,
    checkout: CheckoutService<InMemoryEventStore>,
    orders: OrderService<InMemoryEventStore>,
}

impl Shop {
    fn new() -> Arc<Self> {
        // Heavily contended tests must not run out of attempts.
        let retry = RetryPolicy::new(64);
        let store = InMemoryEventStore::new();
        Arc::new(Self {
            inventory: InventoryService::new(store.clone(), retry),
            carts: CartService::new(store.clone(), retry),
            checkout: CheckoutService::new(store.clone(), retry),
            orders: OrderService::new(store, retry),
        })
    }

    async fn list(&self, sku: &str, cents: i64, stock: u32) -> ProductId {
        let sku = ProductId::new(sku);
        self.inventory
            .list_item(&admin(), &sku, "Widget", Money::from_cents(cents), stock)
            .await
            .unwrap();
        sku
    }

    async fn available(&self, sku: &ProductId) -> u32 {
        self.inventory.get_item(sku).await.unwrap().unwrap().available()
    }

    async fn buy(&self, customer: CustomerId, sku: &ProductId, quantity: u32) -> Order {
        self.carts.add_item(customer, sku, quantity).await.unwrap();
        self.checkout.place_order(customer, "1 Main St").await.unwrap()
    }
}

fn admin() -> Actor {
    Actor::Admin("ops".into())
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn checkout_then_cancel_restores_stock() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let customer = CustomerId::new();

        shop.carts.add_item(customer, &sku, 3).await.unwrap();
        assert_eq!(shop.available(&sku).await, 5);

        let order = shop.checkout.place_order(customer, "1 Main St").await.unwrap();
        assert_eq!(shop.available(&sku).await, 2);

        shop.orders
            .cancel_by_customer(customer, order.id().unwrap())
            .await
            .unwrap();
        assert_eq!(shop.available(&sku).await, 5);
    }

    #[tokio::test]
    async fn second_buyer_finds_no_stock_left() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let alice = CustomerId::new();
        let bob = CustomerId::new();

        // Carts only check availability; both may hold all five.
        shop.carts.add_item(alice, &sku, 5).await.unwrap();
        shop.carts.add_item(bob, &sku, 5).await.unwrap();

        shop.checkout.place_order(alice, "1 Main St").await.unwrap();
        let result = shop.checkout.place_order(bob, "2 Side St").await;

        match result {
            Err(DomainError::Inventory(InventoryError::InsufficientStock {
                available, ..
            })) => assert_eq!(available, 0),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(shop.available(&sku).await, 0);
        assert_eq!(shop.carts.get_cart(bob).await.unwrap().lines().len(), 1);
    }

    #[tokio::test]
    async fn admin_paid_then_cancelled_restocks_once() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let order = shop.buy(CustomerId::new(), &sku, 2).await;
        let id = order.id().unwrap();
        assert_eq!(order.total().cents(), 200);

        shop.orders.set_status(&admin(), id, OrderStatus::Paid).await.unwrap();
        let cancelled = shop
            .orders
            .set_status(&admin(), id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(shop.available(&sku).await, 5);
        assert_eq!(cancelled.total().cents(), 200);

        shop.orders
            .set_status(&admin(), id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(shop.available(&sku).await, 5);
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_shipped() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let order = shop.buy(CustomerId::new(), &sku, 2).await;
        let id = order.id().unwrap();
        shop.orders
            .set_status(&admin(), id, OrderStatus::Cancelled)
            .await
            .unwrap();

        for target in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Paid] {
            match shop.orders.set_status(&admin(), id, target).await {
                Err(DomainError::Order(OrderError::InvalidTransition { from, to })) => {
                    assert_eq!(from, OrderStatus::Cancelled);
                    assert_eq!(to, target);
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }

        let stored = shop.orders.get_order(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);
        assert_eq!(shop.available(&sku).await, 5);
    }

    #[tokio::test]
    async fn duplicate_payment_confirmation_is_harmless() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let order = shop.buy(CustomerId::new(), &sku, 1).await;
        let id = order.id().unwrap();

        let first = shop.orders.confirm_payment(id, Some("cs_1")).await.unwrap();
        let PaymentConfirmation::Applied(paid) = first else {
            panic!("expected Applied, got {first:?}");
        };

        let second = shop.orders.confirm_payment(id, Some("cs_1")).await.unwrap();
        let PaymentConfirmation::AlreadyPaid(again) = second else {
            panic!("expected AlreadyPaid, got {second:?}");
        };
        assert_eq!(again.paid_at(), paid.paid_at());
        assert_eq!(again.status(), OrderStatus::Paid);
        assert_eq!(shop.available(&sku).await, 4);
    }
}

mod properties {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let shop = Shop::new();
        let sku = shop.list("SKU-HOT", 100, 5).await;

        let customers: Vec<_> = (0..12).map(|_| CustomerId::new()).collect();
        for &customer in &customers {
            shop.carts.add_item(customer, &sku, 1).await.unwrap();
        }

        let mut handles = Vec::new();
        for customer in customers {
            let shop = Arc::clone(&shop);
            handles.push(tokio::spawn(async move {
                shop.checkout.place_order(customer, "1 Main St").await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(DomainError::Inventory(InventoryError::InsufficientStock { .. })) => {}
                Err(e) => panic!("unexpected checkout failure: {e}"),
            }
        }

        assert_eq!(placed, 5);
        assert_eq!(shop.available(&sku).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancels_release_once() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let customer = CustomerId::new();
        let order = shop.buy(customer, &sku, 3).await;
        let id = order.id().unwrap();

        let mut handles = Vec::new();
        for n in 0..8 {
            let shop = Arc::clone(&shop);
            handles.push(tokio::spawn(async move {
                if n % 2 == 0 {
                    shop.orders.cancel_by_customer(customer, id).await
                } else {
                    shop.orders
                        .set_status(&admin(), id, OrderStatus::Cancelled)
                        .await
                }
            }));
        }
        for handle in handles {
            let order = handle.await.unwrap().unwrap();
            assert_eq!(order.status(), OrderStatus::Cancelled);
        }

        assert_eq!(shop.available(&sku).await, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stock_is_conserved_across_mixed_traffic() {
        let shop = Shop::new();
        let a = shop.list("A", 100, 10).await;
        let b = shop.list("B", 300, 10).await;

        let mut handles = Vec::new();
        for n in 0..10u32 {
            let shop = Arc::clone(&shop);
            let (a, b) = (a.clone(), b.clone());
            handles.push(tokio::spawn(async move {
                let customer = CustomerId::new();
                shop.carts.add_item(customer, &a, 1 + n % 2).await.ok()?;
                shop.carts.add_item(customer, &b, 1).await.ok()?;
                let order = shop.checkout.place_order(customer, "1 Main St").await.ok()?;
                if n % 3 == 0 {
                    shop.orders
                        .cancel_by_customer(customer, order.id().unwrap())
                        .await
                        .unwrap();
                    return None;
                }
                Some(order)
            }));
        }

        let mut held_a = 0;
        let mut held_b = 0;
        for handle in handles {
            if let Some(order) = handle.await.unwrap() {
                for line in order.lines() {
                    if line.product_id == a {
                        held_a += line.quantity;
                    } else {
                        held_b += line.quantity;
                    }
                }
            }
        }

        assert_eq!(shop.available(&a).await + held_a, 10);
        assert_eq!(shop.available(&b).await + held_b, 10);
    }

    #[tokio::test]
    async fn total_survives_price_changes() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let customer = CustomerId::new();
        let order = shop.buy(customer, &sku, 2).await;

        shop.inventory
            .change_price(&admin(), &sku, Money::from_cents(500))
            .await
            .unwrap();

        let stored = shop
            .orders
            .get_customer_order(customer, order.id().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.total().cents(), 200);
    }
}

mod carts {
    use super::*;

    #[tokio::test]
    async fn add_beyond_stock_reports_available() {
        let shop = Shop::new();
        let sku = shop.list("SKU-1", 100, 5).await;
        let customer = CustomerId::new();
        shop.carts.add_item(customer, &sku, 4).await.unwrap();

        match shop.carts.add_item(customer, &sku, 2).await {
            Err(DomainError::Cart(CartError::ExceedsAvailableStock {
                requested,
                available,
                ..
            })) => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("expected ExceedsAvailableStock, got {other:?}"),
        }
    }
}
