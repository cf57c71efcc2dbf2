//! Order saga service entry point.
//!
//! Wires the in-memory stores, engines, and background tasks together and
//! drives a pair of demonstration orders through the saga: one that
//! completes and one that is declined and compensated.

mod config;

use common::{Money, ProductId, UserId};
use inventory::{InMemoryInventoryStore, ReservationEngine, spawn_expiry_sweep};
use outbox::{InMemoryMessageBus, InMemoryOutboxStore, OutboxPublisher, spawn_outbox_publisher};
use payment::{InMemoryPaymentLedger, PaymentEngine, SimulatedGateway};
use saga::{
    InMemoryOrderStore, InMemorySagaStateStore, InMemoryUserDirectory, LocalInventoryClient,
    LocalPaymentClient, Order, OrderItem, OrderStore, SagaOrchestrator,
};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build engines over in-memory stores and seed the catalog
    let reservation_engine =
        ReservationEngine::new(InMemoryInventoryStore::new(), config.reservation());
    reservation_engine
        .register_product(ProductId::new("SKU-001"), "Widget", 100)
        .await
        .expect("failed to seed inventory");
    reservation_engine
        .register_product(ProductId::new("SKU-002"), "Gadget", 25)
        .await
        .expect("failed to seed inventory");

    let gateway = SimulatedGateway::new();
    let payment_engine = PaymentEngine::new(InMemoryPaymentLedger::new(), gateway.clone());

    let users = InMemoryUserDirectory::new();
    let user_id = UserId::new();
    users.register_user(user_id, true);

    let orders = InMemoryOrderStore::new();
    let sagas = InMemorySagaStateStore::new();
    let outbox_store = InMemoryOutboxStore::new();
    let bus = InMemoryMessageBus::new();

    // 4. Start the background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_handle = spawn_expiry_sweep(
        reservation_engine.clone(),
        config.sweep_interval,
        shutdown_rx.clone(),
    );
    let publisher_handle = spawn_outbox_publisher(
        OutboxPublisher::new(outbox_store.clone(), bus.clone(), config.outbox()),
        shutdown_rx,
    );

    // 5. Build the orchestrator
    let orchestrator = SagaOrchestrator::new(
        orders.clone(),
        sagas,
        outbox_store,
        LocalInventoryClient::new(reservation_engine),
        LocalPaymentClient::new(payment_engine),
        users,
        config.orchestrator(),
    );

    // 6. Drive two demonstration orders: a success and a compensated decline
    let order = Order::new(
        user_id,
        vec![
            OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1999)),
            OrderItem::new("SKU-002", "Gadget", 1, Money::from_cents(4999)),
        ],
        "USD",
    );
    let order_id = order.id;
    orders.save(order).await.expect("failed to save order");

    match orchestrator.execute_saga(order_id).await {
        Ok(saga) => tracing::info!(%order_id, status = %saga.status, "demo order finished"),
        Err(e) => tracing::error!(%order_id, error = %e, "demo order failed to run"),
    }

    gateway.set_decline(Some("Insufficient funds")).await;
    let declined = Order::new(
        user_id,
        vec![OrderItem::new(
            "SKU-001",
            "Widget",
            1,
            Money::from_cents(1999),
        )],
        "USD",
    );
    let declined_id = declined.id;
    orders.save(declined).await.expect("failed to save order");

    match orchestrator.execute_saga(declined_id).await {
        Ok(saga) => {
            tracing::info!(order_id = %declined_id, status = %saga.status, "declined demo order finished")
        }
        Err(e) => tracing::error!(order_id = %declined_id, error = %e, "declined demo order failed to run"),
    }
    gateway.set_decline(None).await;

    // 7. Run until a shutdown signal arrives
    tracing::info!("order saga service running; press Ctrl-C to stop");
    shutdown_signal().await;

    shutdown_tx.send(true).ok();
    sweep_handle.await.expect("expiry sweep task panicked");
    publisher_handle.await.expect("outbox publisher task panicked");

    tracing::debug!(metrics = %metrics_handle.render(), "final metrics snapshot");
    tracing::info!("service shut down gracefully");
}
