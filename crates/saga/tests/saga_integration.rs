//! End-to-end saga tests over the real engines, reached through the
//! in-process client adapters.

use std::time::Duration;

use common::{Money, OrderId, ProductId, UserId};
use inventory::{
    InMemoryInventoryStore, InventoryStore, ReservationConfig, ReservationEngine, ReservationStatus,
};
use outbox::{InMemoryMessageBus, InMemoryOutboxStore, OutboxConfig, OutboxPublisher};
use payment::{
    InMemoryPaymentLedger, PaymentEngine, PaymentLedger, PaymentStatus, SimulatedGateway,
};
use resilience::RetryPolicy;
use saga::{
    InMemoryOrderStore, InMemorySagaStateStore, InMemoryUserDirectory, LocalInventoryClient,
    LocalPaymentClient, OrchestratorConfig, Order, OrderItem, OrderStatus, OrderStore,
    RemoteCallConfig, SagaOrchestrator, SagaStateStore, SagaStatus, SagaStep,
};

type TestOrchestrator = SagaOrchestrator<
    InMemoryOrderStore,
    InMemorySagaStateStore,
    InMemoryOutboxStore,
    LocalInventoryClient<InMemoryInventoryStore>,
    LocalPaymentClient<InMemoryPaymentLedger, SimulatedGateway>,
    InMemoryUserDirectory,
>;

struct Harness {
    orchestrator: TestOrchestrator,
    orders: InMemoryOrderStore,
    sagas: InMemorySagaStateStore,
    outbox_store: InMemoryOutboxStore,
    bus: InMemoryMessageBus,
    engine: ReservationEngine<InMemoryInventoryStore>,
    ledger: InMemoryPaymentLedger,
    gateway: SimulatedGateway,
    users: InMemoryUserDirectory,
    inventory_client: LocalInventoryClient<InMemoryInventoryStore>,
    payment_client: LocalPaymentClient<InMemoryPaymentLedger, SimulatedGateway>,
}

fn fast_call_config() -> RemoteCallConfig {
    RemoteCallConfig {
        deadline: Duration::from_millis(500),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
        },
        ..RemoteCallConfig::default()
    }
}

async fn setup() -> Harness {
    let engine = ReservationEngine::new(
        InMemoryInventoryStore::new(),
        ReservationConfig {
            reservation_ttl: Duration::from_secs(900),
            retry: RetryPolicy::with_max_attempts(10),
        },
    );
    engine
        .register_product(ProductId::new("SKU-001"), "Widget", 10)
        .await
        .unwrap();

    let ledger = InMemoryPaymentLedger::new();
    let gateway = SimulatedGateway::new();
    let users = InMemoryUserDirectory::new();

    let inventory_client = LocalInventoryClient::new(engine.clone());
    let payment_client =
        LocalPaymentClient::new(PaymentEngine::new(ledger.clone(), gateway.clone()));

    let orders = InMemoryOrderStore::new();
    let sagas = InMemorySagaStateStore::new();
    let outbox_store = InMemoryOutboxStore::new();
    let bus = InMemoryMessageBus::new();

    let orchestrator = SagaOrchestrator::new(
        orders.clone(),
        sagas.clone(),
        outbox_store.clone(),
        inventory_client.clone(),
        payment_client.clone(),
        users.clone(),
        OrchestratorConfig {
            user: fast_call_config(),
            inventory: fast_call_config(),
            payment: fast_call_config(),
        },
    );

    Harness {
        orchestrator,
        orders,
        sagas,
        outbox_store,
        bus,
        engine,
        ledger,
        gateway,
        users,
        inventory_client,
        payment_client,
    }
}

async fn place_order(harness: &Harness, quantity: u32) -> (OrderId, UserId) {
    let user_id = UserId::new();
    harness.users.register_user(user_id, true);

    let order = Order::new(
        user_id,
        vec![OrderItem::new(
            "SKU-001",
            "Widget",
            quantity,
            Money::from_cents(1000),
        )],
        "USD",
    );
    let order_id = order.id;
    harness.orders.save(order).await.unwrap();
    (order_id, user_id)
}

async fn stock_triple(harness: &Harness) -> (u32, u32, u32) {
    let stock = harness
        .engine
        .check_stock(&ProductId::new("SKU-001"))
        .await
        .unwrap();
    (stock.available, stock.reserved, stock.total)
}

#[tokio::test]
async fn happy_path_completes_order_and_publishes_event() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 2).await;

    let saga = harness.orchestrator.execute_saga(order_id).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Completed);
    assert_eq!(saga.current_step, SagaStep::OrderCompleted);
    assert!(saga.reservation_id.is_some());
    assert!(saga.payment_id.is_some());

    // Order completed with a payment reference attached.
    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.payment_reference.unwrap().starts_with("PAY-"));

    // Stock committed: two units left the system.
    assert_eq!(stock_triple(&harness).await, (8, 0, 8));

    // Payment captured exactly once.
    assert_eq!(harness.gateway.capture_count(), 1);
    let payment = harness
        .ledger
        .get(saga.payment_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);

    // Terminal outcome goes out through the outbox.
    let publisher = OutboxPublisher::new(
        harness.outbox_store.clone(),
        harness.bus.clone(),
        OutboxConfig::default(),
    );
    assert_eq!(publisher.run_once().await.unwrap(), 1);

    let messages = harness.bus.messages_on("order.completed").await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].key, order_id.to_string());
    assert_eq!(messages[0].payload["order_id"], order_id.to_string());
}

#[tokio::test]
async fn payment_decline_releases_stock_and_cancels_order() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 3).await;
    harness.gateway.set_decline(Some("Insufficient funds")).await;

    let saga = harness.orchestrator.execute_saga(order_id).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.current_step, SagaStep::CompensationCompleted);
    assert!(saga.payment_id.is_none());

    // The reservation was released exactly once: counters are back to the
    // original values, not over-released.
    assert_eq!(stock_triple(&harness).await, (10, 0, 10));
    let rows = harness
        .engine
        .store()
        .reservations_by_id(saga.reservation_id.unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ReservationStatus::Released);

    // A declined capture is not refunded.
    assert_eq!(harness.gateway.refund_count(), 0);

    // Order failed with the causing error recorded.
    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(
        order
            .cancellation_reason
            .unwrap()
            .contains("Insufficient funds")
    );

    // Exactly one OrderCancelled event.
    let events = harness.outbox_store.all_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "OrderCancelled");
}

#[tokio::test]
async fn unknown_user_fails_before_any_side_effects() {
    let harness = setup().await;

    // Order for a user the directory has never seen.
    let order = Order::new(
        UserId::new(),
        vec![OrderItem::new(
            "SKU-001",
            "Widget",
            1,
            Money::from_cents(1000),
        )],
        "USD",
    );
    let order_id = order.id;
    harness.orders.save(order).await.unwrap();

    let saga = harness.orchestrator.execute_saga(order_id).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert!(saga.reservation_id.is_none());
    assert!(saga.payment_id.is_none());

    assert_eq!(stock_triple(&harness).await, (10, 0, 10));
    assert_eq!(harness.gateway.capture_count(), 0);

    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
}

#[tokio::test]
async fn suspended_user_is_rejected() {
    let harness = setup().await;
    let user_id = UserId::new();
    harness.users.register_user(user_id, false);

    let order = Order::new(
        user_id,
        vec![OrderItem::new(
            "SKU-001",
            "Widget",
            1,
            Money::from_cents(1000),
        )],
        "USD",
    );
    let order_id = order.id;
    harness.orders.save(order).await.unwrap();

    let saga = harness.orchestrator.execute_saga(order_id).await.unwrap();
    assert_eq!(saga.status, SagaStatus::Compensated);

    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert!(order.cancellation_reason.unwrap().contains("suspended"));
}

#[tokio::test]
async fn insufficient_stock_cancels_without_touching_counters() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 99).await;

    let saga = harness.orchestrator.execute_saga(order_id).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(stock_triple(&harness).await, (10, 0, 10));
    assert_eq!(harness.gateway.capture_count(), 0);

    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.cancellation_reason.unwrap().contains("nsufficient"));

    let events = harness.outbox_store.all_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "OrderCancelled");
}

#[tokio::test]
async fn payment_outage_is_compensated_after_retries() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 2).await;
    harness.payment_client.set_unavailable(true);

    let saga = harness.orchestrator.execute_saga(order_id).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Compensated);
    // Transport failures were retried before giving up.
    assert!(saga.retry_count >= 1);

    // The reserved stock went back.
    assert_eq!(stock_triple(&harness).await, (10, 0, 10));

    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.cancellation_reason.unwrap().contains("unavailable"));
}

/// Inventory client whose release path is down while everything else works.
#[derive(Clone)]
struct ReleaseFailsClient<C>(C);

#[async_trait::async_trait]
impl<C: saga::InventoryClient> saga::InventoryClient for ReleaseFailsClient<C> {
    async fn reserve_stock(
        &self,
        order_id: OrderId,
        items: &[saga::StockItem],
    ) -> Result<saga::ReserveStockResponse, saga::ClientError> {
        self.0.reserve_stock(order_id, items).await
    }

    async fn release_stock(
        &self,
        _reservation_id: common::ReservationId,
        _order_id: OrderId,
        _reason: &str,
    ) -> Result<saga::ReleaseStockResponse, saga::ClientError> {
        Err(saga::ClientError::Unavailable(
            "inventory service unreachable".to_string(),
        ))
    }

    async fn commit_stock(
        &self,
        reservation_id: common::ReservationId,
        order_id: OrderId,
    ) -> Result<saga::ReleaseStockResponse, saga::ClientError> {
        self.0.commit_stock(reservation_id, order_id).await
    }

    async fn check_stock(
        &self,
        product_id: &ProductId,
    ) -> Result<saga::CheckStockResponse, saga::ClientError> {
        self.0.check_stock(product_id).await
    }
}

#[tokio::test]
async fn failed_release_still_terminates_the_saga() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 2).await;
    harness.gateway.set_decline(Some("Card declined")).await;

    let orchestrator = SagaOrchestrator::new(
        harness.orders.clone(),
        harness.sagas.clone(),
        harness.outbox_store.clone(),
        ReleaseFailsClient(harness.inventory_client.clone()),
        harness.payment_client.clone(),
        harness.users.clone(),
        OrchestratorConfig {
            user: fast_call_config(),
            inventory: fast_call_config(),
            payment: fast_call_config(),
        },
    );

    let saga = orchestrator.execute_saga(order_id).await.unwrap();

    // The compensation step failed, but the saga is still terminal and the
    // order still resolves; the stuck reservation is the expiry sweep's
    // problem from here.
    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.current_step, SagaStep::CompensationCompleted);
    assert!(saga.retry_count >= 1);
    assert_eq!(stock_triple(&harness).await, (8, 2, 10));

    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
}

#[tokio::test]
async fn saga_cannot_run_twice_for_the_same_order() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 1).await;

    harness.orchestrator.execute_saga(order_id).await.unwrap();
    let second = harness.orchestrator.execute_saga(order_id).await;

    assert!(second.is_err());
    // One terminal event only.
    assert_eq!(harness.outbox_store.all_events().await.len(), 1);
}

#[tokio::test]
async fn recovery_compensates_a_saga_interrupted_after_payment() {
    let harness = setup().await;
    let (order_id, user_id) = place_order(&harness, 2).await;

    // Reproduce the durable state of a saga that crashed right after the
    // payment step: stock reserved, payment captured, nothing completed.
    let mut order = harness.orders.get(order_id).await.unwrap().unwrap();

    let reservation_id = harness
        .engine
        .reserve(order_id, &ProductId::new("SKU-001"), 2)
        .await
        .unwrap();

    let payment = {
        let engine = PaymentEngine::new(harness.ledger.clone(), harness.gateway.clone());
        engine
            .process_payment(
                &order.order_number,
                order_id,
                user_id,
                order.total_amount,
                "USD",
                payment::PaymentMethod::Card,
            )
            .await
            .unwrap()
    };
    assert_eq!(payment.status, PaymentStatus::Completed);

    order
        .confirm_payment(payment.payment_reference.clone().unwrap())
        .unwrap();
    harness.orders.save(order).await.unwrap();

    let mut crashed = saga::SagaState::new(order_id);
    crashed.advance_to(SagaStep::UserValidated).unwrap();
    crashed.advance_to(SagaStep::StockReserved).unwrap();
    crashed.reservation_id = Some(reservation_id);
    crashed.advance_to(SagaStep::PaymentProcessed).unwrap();
    crashed.payment_id = Some(payment.payment_id);
    harness.sagas.save(crashed).await.unwrap();

    // Recovery reads the last persisted step and unwinds it.
    let recovered = harness.orchestrator.recover(order_id).await.unwrap();

    assert_eq!(recovered.status, SagaStatus::Compensated);
    assert_eq!(recovered.current_step, SagaStep::CompensationCompleted);

    // Payment refunded, stock released.
    assert_eq!(harness.gateway.refund_count(), 1);
    let refunded = harness
        .ledger
        .get(payment.payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(stock_triple(&harness).await, (10, 0, 10));

    let order = harness.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);

    // Recovering a terminal saga is a no-op.
    let again = harness.orchestrator.recover(order_id).await.unwrap();
    assert_eq!(again.status, SagaStatus::Compensated);
    assert_eq!(harness.gateway.refund_count(), 1);
}

#[tokio::test]
async fn outbox_failure_does_not_lose_the_terminal_event() {
    let harness = setup().await;
    let (order_id, _) = place_order(&harness, 1).await;

    harness.orchestrator.execute_saga(order_id).await.unwrap();

    let publisher = OutboxPublisher::new(
        harness.outbox_store.clone(),
        harness.bus.clone(),
        OutboxConfig::default(),
    );

    // The broker is down on the first poll; the event stays queued.
    harness.bus.set_fail_sends(true).await;
    assert_eq!(publisher.run_once().await.unwrap(), 0);
    assert_eq!(harness.outbox_store.unprocessed_count().await, 1);

    harness.bus.set_fail_sends(false).await;
    assert_eq!(publisher.run_once().await.unwrap(), 1);
    assert_eq!(harness.bus.messages_on("order.completed").await.len(), 1);
}
