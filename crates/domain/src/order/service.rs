//! Order status changes, ownership checks and payment confirmation.

use common::{AggregateId, CustomerId};
use event_store::EventStore;

use crate::actor::Actor;
use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, UnitOfWork};
use crate::error::DomainError;
use crate::inventory::{InventoryError, InventoryItem};
use crate::retry::RetryPolicy;

use super::{Order, OrderError, OrderEvent, OrderLine, OrderStatus};

/// What a payment confirmation did to the order.
#[derive(Debug)]
pub enum PaymentConfirmation {
    /// The order moved from PENDING to PAID.
    Applied(Order),

    /// The order was already PAID; nothing was written.
    AlreadyPaid(Order),

    /// No order with that id exists.
    UnknownOrder,

    /// The order is in a status that can no longer be paid.
    NotPayable { status: OrderStatus },
}

/// Status changes on orders.
///
/// A change that cancels the order stages the matching `StockReleased`
/// events in the same unit of work, guarded by the order's version, so the
/// reserved stock goes back exactly once however many cancellations race.
pub struct OrderService<S: EventStore> {
    orders: CommandHandler<S, Order>,
    inventory: CommandHandler<S, InventoryItem>,
    retry: RetryPolicy,
}

impl<S: EventStore + Clone> OrderService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            orders: CommandHandler::new(store.clone()),
            inventory: CommandHandler::new(store),
            retry,
        }
    }
}

impl<S: EventStore> OrderService<S> {
    /// Loads any order, or None if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.orders.load_existing(order_id).await
    }

    /// Loads an order owned by `customer`. Other customers' orders are
    /// reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_customer_order(
        &self,
        customer: CustomerId,
        order_id: AggregateId,
    ) -> Result<Order, DomainError> {
        self.load_visible(order_id, Some(customer)).await
    }

    /// Cancels a PENDING order on behalf of its owner and returns its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_by_customer(
        &self,
        customer: CustomerId,
        order_id: AggregateId,
    ) -> Result<Order, DomainError> {
        let actor = Actor::Customer(customer);
        let cancelled_by = actor.to_string();
        let cancelled_by = cancelled_by.as_str();

        self.transition(
            "order.cancel",
            order_id,
            &actor,
            Some(customer),
            move |order| order.cancel_by_customer(cancelled_by),
        )
        .await
    }

    /// Administrative status change. Cancelling returns the reserved stock.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(
        &self,
        actor: &Actor,
        order_id: AggregateId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let changed_by = actor.to_string();
        let changed_by = changed_by.as_str();

        self.transition("order.set_status", order_id, actor, None, move |order| {
            order.transition_to(status, changed_by)
        })
        .await
    }

    /// Loads an order of `customer` that can still be paid.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_payable(
        &self,
        customer: CustomerId,
        order_id: AggregateId,
    ) -> Result<Order, DomainError> {
        let order = self.load_visible(order_id, Some(customer)).await?;
        if !order.status().is_payable() {
            return Err(OrderError::NotPayable {
                status: order.status(),
            }
            .into());
        }
        Ok(order)
    }

    /// Records the provider session opened for a PENDING order.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_session(
        &self,
        customer: CustomerId,
        order_id: AggregateId,
        session_id: &str,
    ) -> Result<Order, DomainError> {
        let actor = Actor::Customer(customer);
        self.transition(
            "order.record_payment_session",
            order_id,
            &actor,
            Some(customer),
            move |order| order.open_payment_session(session_id.to_string()),
        )
        .await
    }

    /// Marks an order as paid by the provider.
    ///
    /// Unknown orders and orders that are already PAID are reported rather
    /// than failing, so duplicate notifications are harmless.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        order_id: AggregateId,
        session_id: Option<&str>,
    ) -> Result<PaymentConfirmation, DomainError> {
        let actor = Actor::PaymentProvider;
        let actor = &actor;

        self.retry
            .run("order.confirm_payment", move || async move {
                let mut order = self.orders.load(order_id).await?;
                if !order.exists() {
                    return Ok(PaymentConfirmation::UnknownOrder);
                }
                match order.status() {
                    OrderStatus::Paid => return Ok(PaymentConfirmation::AlreadyPaid(order)),
                    OrderStatus::Pending => {}
                    status => return Ok(PaymentConfirmation::NotPayable { status }),
                }

                let events = order.confirm_payment(session_id.map(str::to_string))?;
                let mut uow = UnitOfWork::new(actor);
                uow.stage(order_id, &order, &events)?;
                uow.commit(self.orders.store()).await?;

                order.apply_committed(events);
                tracing::info!(%order_id, "order paid");
                Ok(PaymentConfirmation::Applied(order))
            })
            .await
    }

    /// Runs `command` against the current order and commits its events
    /// together with any stock they release.
    async fn transition<F>(
        &self,
        operation: &'static str,
        order_id: AggregateId,
        actor: &Actor,
        owner: Option<CustomerId>,
        command: F,
    ) -> Result<Order, DomainError>
    where
        F: Fn(&Order) -> Result<Vec<OrderEvent>, OrderError> + Sync,
    {
        let command = &command;

        self.retry
            .run(operation, move || async move {
                let mut order = self.load_visible(order_id, owner).await?;
                let events = command(&order)?;
                if events.is_empty() {
                    return Ok(order);
                }

                let mut uow = UnitOfWork::new(actor);
                uow.stage(order_id, &order, &events)?;
                let released = self
                    .stage_release(&mut uow, order_id, order.lines_released_by(&events))
                    .await?;
                uow.commit(self.orders.store()).await?;

                if released > 0 {
                    metrics::counter!("stock_released_total").increment(u64::from(released));
                }
                order.apply_committed(events);
                tracing::info!(%order_id, status = %order.status(), released, "order status changed");
                Ok(order)
            })
            .await
    }

    /// Stages a `StockReleased` per line, in product id order. Returns the
    /// number of units released.
    async fn stage_release(
        &self,
        uow: &mut UnitOfWork,
        order_id: AggregateId,
        lines: &[OrderLine],
    ) -> Result<u32, DomainError> {
        let mut released = 0;
        for line in lines {
            let stream_id = line.product_id.stream_id();
            let item = self.inventory.load_existing(stream_id).await?.ok_or_else(|| {
                InventoryError::NotListed {
                    product_id: line.product_id.clone(),
                }
            })?;
            let events = item.release(order_id, line.quantity)?;
            uow.stage(stream_id, &item, &events)?;
            released += line.quantity;
        }
        Ok(released)
    }

    async fn load_visible(
        &self,
        order_id: AggregateId,
        owner: Option<CustomerId>,
    ) -> Result<Order, DomainError> {
        match self.orders.load_existing(order_id).await? {
            Some(order) if owner.is_none_or(|customer| order.is_owned_by(customer)) => Ok(order),
            _ => Err(DomainError::not_found("Order", order_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartService;
    use crate::checkout::CheckoutService;
    use crate::inventory::InventoryService;
    use crate::value_objects::{Money, ProductId};
    use event_store::InMemoryEventStore;

    struct Fixture {
        orders: OrderService<InMemoryEventStore>,
        inventory: InventoryService<InMemoryEventStore>,
        customer: CustomerId,
        sku: ProductId,
    }

    fn admin() -> Actor {
        Actor::Admin("ops".into())
    }

    /// Lists an item with `stock` units and checks out `quantity` of them.
    async fn placed_order(stock: u32, quantity: u32) -> (Fixture, Order) {
        let store = InMemoryEventStore::new();
        let retry = RetryPolicy::default();
        let inventory = InventoryService::new(store.clone(), retry);
        let sku = ProductId::new("SKU-001");
        inventory
            .list_item(&admin(), &sku, "Widget", Money::from_cents(100), stock)
            .await
            .unwrap();

        let customer = CustomerId::new();
        CartService::new(store.clone(), retry)
            .add_item(customer, &sku, quantity)
            .await
            .unwrap();
        let order = CheckoutService::new(store.clone(), retry)
            .place_order(customer, "1 Main St")
            .await
            .unwrap();

        let fixture = Fixture {
            orders: OrderService::new(store, retry),
            inventory,
            customer,
            sku,
        };
        (fixture, order)
    }

    async fn available(fixture: &Fixture) -> u32 {
        fixture
            .inventory
            .get_item(&fixture.sku)
            .await
            .unwrap()
            .unwrap()
            .available()
    }

    fn order_id(order: &Order) -> AggregateId {
        order.id().unwrap()
    }

    #[tokio::test]
    async fn customer_cancel_restores_stock_once() {
        let (f, order) = placed_order(5, 3).await;
        assert_eq!(available(&f).await, 2);

        let cancelled = f
            .orders
            .cancel_by_customer(f.customer, order_id(&order))
            .await
            .unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(available(&f).await, 5);

        let again = f
            .orders
            .cancel_by_customer(f.customer, order_id(&order))
            .await
            .unwrap();
        assert_eq!(again.status(), OrderStatus::Cancelled);
        assert_eq!(available(&f).await, 5);
    }

    #[tokio::test]
    async fn other_customers_see_not_found() {
        let (f, order) = placed_order(5, 1).await;
        let stranger = CustomerId::new();

        assert!(matches!(
            f.orders.get_customer_order(stranger, order_id(&order)).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            f.orders.cancel_by_customer(stranger, order_id(&order)).await,
            Err(DomainError::NotFound { .. })
        ));
        assert_eq!(available(&f).await, 4);
    }

    #[tokio::test]
    async fn customer_cannot_cancel_paid_order() {
        let (f, order) = placed_order(5, 1).await;
        f.orders
            .set_status(&admin(), order_id(&order), OrderStatus::Paid)
            .await
            .unwrap();

        let result = f.orders.cancel_by_customer(f.customer, order_id(&order)).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotCancellable { .. }))
        ));
    }

    #[tokio::test]
    async fn admin_cancel_after_payment_restores_stock() {
        let (f, order) = placed_order(5, 2).await;
        let id = order_id(&order);

        let paid = f.orders.set_status(&admin(), id, OrderStatus::Paid).await.unwrap();
        assert!(paid.paid_at().is_some());

        let cancelled = f
            .orders
            .set_status(&admin(), id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.total().cents(), 200);
        assert_eq!(available(&f).await, 5);

        f.orders
            .set_status(&admin(), id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(available(&f).await, 5);
    }

    #[tokio::test]
    async fn shipping_has_no_stock_effect() {
        let (f, order) = placed_order(5, 2).await;
        let id = order_id(&order);
        for status in [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Delivered] {
            f.orders.set_status(&admin(), id, status).await.unwrap();
        }
        assert_eq!(available(&f).await, 3);
    }

    #[tokio::test]
    async fn payment_confirmation_outcomes() {
        let (f, order) = placed_order(5, 1).await;
        let id = order_id(&order);

        let first = f.orders.confirm_payment(id, Some("cs_1")).await.unwrap();
        let paid_at = match first {
            PaymentConfirmation::Applied(order) => {
                assert_eq!(order.payment_session_id(), Some("cs_1"));
                order.paid_at()
            }
            other => panic!("expected Applied, got {other:?}"),
        };

        match f.orders.confirm_payment(id, Some("cs_1")).await.unwrap() {
            PaymentConfirmation::AlreadyPaid(order) => assert_eq!(order.paid_at(), paid_at),
            other => panic!("expected AlreadyPaid, got {other:?}"),
        }

        assert!(matches!(
            f.orders.confirm_payment(AggregateId::new(), None).await.unwrap(),
            PaymentConfirmation::UnknownOrder
        ));
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_paid() {
        let (f, order) = placed_order(5, 1).await;
        let id = order_id(&order);
        f.orders.cancel_by_customer(f.customer, id).await.unwrap();

        assert!(matches!(
            f.orders.confirm_payment(id, None).await.unwrap(),
            PaymentConfirmation::NotPayable {
                status: OrderStatus::Cancelled
            }
        ));
        assert!(matches!(
            f.orders.ensure_payable(f.customer, id).await,
            Err(DomainError::Order(OrderError::NotPayable { .. }))
        ));
    }

    #[tokio::test]
    async fn payment_session_is_recorded() {
        let (f, order) = placed_order(5, 1).await;
        let id = order_id(&order);

        f.orders.ensure_payable(f.customer, id).await.unwrap();
        f.orders
            .record_payment_session(f.customer, id, "cs_1")
            .await
            .unwrap();
        let order = f
            .orders
            .record_payment_session(f.customer, id, "cs_2")
            .await
            .unwrap();
        assert_eq!(order.payment_session_id(), Some("cs_2"));
    }
}
