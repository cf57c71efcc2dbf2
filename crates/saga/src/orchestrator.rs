//! Saga orchestrator driving the order workflow.

use common::OrderId;
use outbox::{OutboxEvent, OutboxStore};
use payment::PaymentMethod;

use crate::error::{Result, SagaError};
use crate::events::{
    ORDER_AGGREGATE_TYPE, ORDER_CANCELLED_EVENT, ORDER_COMPLETED_EVENT, OrderCancelledEvent,
    OrderCompletedEvent,
};
use crate::order::{Order, OrderStatus};
use crate::policy::{RemoteCallConfig, RemoteCallPolicy};
use crate::services::{InventoryClient, PaymentClient, StockItem, UserClient};
use crate::state::{SagaState, SagaStatus, SagaStep};
use crate::store::{OrderStore, SagaStateStore};

/// Per-collaborator call policies for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub user: RemoteCallConfig,
    pub inventory: RemoteCallConfig,
    pub payment: RemoteCallConfig,
}

/// Drives the order saga:
/// validate user → reserve stock → capture payment → complete.
///
/// Saga state is persisted after every step, so a crash can resume from the
/// last durable step. On any step failure the completed side effects are
/// compensated in reverse order and the saga still reaches a terminal
/// status; the terminal outcome is announced through the outbox exactly
/// once.
pub struct SagaOrchestrator<OS, SS, XS, I, P, U> {
    orders: OS,
    sagas: SS,
    outbox: XS,
    inventory: I,
    payment: P,
    user: U,
    user_policy: RemoteCallPolicy,
    inventory_policy: RemoteCallPolicy,
    payment_policy: RemoteCallPolicy,
}

impl<OS, SS, XS, I, P, U> SagaOrchestrator<OS, SS, XS, I, P, U>
where
    OS: OrderStore,
    SS: SagaStateStore,
    XS: OutboxStore,
    I: InventoryClient,
    P: PaymentClient,
    U: UserClient,
{
    /// Creates a new orchestrator.
    pub fn new(
        orders: OS,
        sagas: SS,
        outbox: XS,
        inventory: I,
        payment: P,
        user: U,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            orders,
            sagas,
            outbox,
            inventory,
            payment,
            user,
            user_policy: RemoteCallPolicy::new("user-service", config.user),
            inventory_policy: RemoteCallPolicy::new("inventory-service", config.inventory),
            payment_policy: RemoteCallPolicy::new("payment-service", config.payment),
        }
    }

    /// Runs the saga for a pending order to a terminal state.
    ///
    /// Returns the terminal saga state: `Completed` on success, or
    /// `Compensated` when a step failed and its side effects were undone.
    #[tracing::instrument(skip(self))]
    pub async fn execute_saga(&self, order_id: OrderId) -> Result<SagaState> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::Pending {
            return Err(SagaError::OrderNotReady(format!(
                "order is in {} status, expected Pending",
                order.status
            )));
        }
        if !order.has_items() {
            return Err(SagaError::OrderNotReady("order has no items".to_string()));
        }

        let mut saga = SagaState::new(order_id);
        self.sagas.save(saga.clone()).await?;
        tracing::info!(%order_id, "saga started");

        if let Err(e) = self.validate_user(&order, &mut saga).await {
            let result = self.compensate(order, saga, e.to_string()).await;
            metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
            return result;
        }

        if let Err(e) = self.reserve_stock(&order, &mut saga).await {
            let result = self.compensate(order, saga, e.to_string()).await;
            metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
            return result;
        }

        if let Err(e) = self.process_payment(&mut order, &mut saga).await {
            let result = self.compensate(order, saga, e.to_string()).await;
            metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
            return result;
        }

        self.complete_order(&mut order, &mut saga).await?;

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        metrics::counter!("saga_completed_total").increment(1);
        tracing::info!(%order_id, "saga completed successfully");
        Ok(saga)
    }

    /// Resumes an interrupted saga after a crash.
    ///
    /// Reads the last persisted step; a terminal saga is returned as-is,
    /// anything else is driven to `Compensated` by undoing whatever the
    /// durable state says was completed.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self, order_id: OrderId) -> Result<SagaState> {
        let saga = self
            .sagas
            .get(order_id)
            .await?
            .ok_or(SagaError::SagaNotFound(order_id))?;

        if saga.is_terminal() {
            return Ok(saga);
        }

        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        let reason = saga
            .error_message
            .clone()
            .unwrap_or_else(|| "saga interrupted before completion".to_string());

        tracing::warn!(%order_id, step = %saga.current_step, "recovering interrupted saga");
        metrics::counter!("saga_recoveries_total").increment(1);
        self.compensate(order, saga, reason).await
    }

    /// Returns the persisted saga state for an order.
    pub async fn get_saga(&self, order_id: OrderId) -> Result<Option<SagaState>> {
        self.sagas.get(order_id).await
    }

    async fn validate_user(&self, order: &Order, saga: &mut SagaState) -> Result<()> {
        tracing::info!(order_id = %order.id, step = "validate_user", "saga step started");
        let user_id = order.user_id;

        let response = self
            .user_policy
            .call(|| self.user.validate_user(user_id))
            .await
            .map_err(|e| {
                saga.record_retry();
                SagaError::StepFailed {
                    step: "validate_user",
                    reason: e.to_string(),
                }
            })?;

        if !response.is_valid || !response.is_active {
            return Err(SagaError::StepFailed {
                step: "validate_user",
                reason: response
                    .message
                    .unwrap_or_else(|| "user validation failed".to_string()),
            });
        }

        saga.advance_to(SagaStep::UserValidated)?;
        self.sagas.save(saga.clone()).await?;
        tracing::info!(order_id = %order.id, "user validated");
        Ok(())
    }

    async fn reserve_stock(&self, order: &Order, saga: &mut SagaState) -> Result<()> {
        tracing::info!(order_id = %order.id, step = "reserve_stock", "saga step started");

        let items: Vec<StockItem> = order
            .items
            .iter()
            .map(|item| StockItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect();

        let order_id = order.id;
        let response = self
            .inventory_policy
            .call(|| self.inventory.reserve_stock(order_id, &items))
            .await
            .map_err(|e| {
                saga.record_retry();
                SagaError::StepFailed {
                    step: "reserve_stock",
                    reason: e.to_string(),
                }
            })?;

        if !response.success {
            // A batch can fail part-way; the rows it did write stay Active
            // under the returned ID, so record it for compensation.
            if response.reservation_id.is_some() {
                saga.reservation_id = response.reservation_id;
                self.sagas.save(saga.clone()).await?;
            }
            return Err(SagaError::StepFailed {
                step: "reserve_stock",
                reason: response
                    .message
                    .unwrap_or_else(|| "stock reservation failed".to_string()),
            });
        }

        saga.reservation_id = response.reservation_id;
        saga.advance_to(SagaStep::StockReserved)?;
        self.sagas.save(saga.clone()).await?;
        tracing::info!(order_id = %order.id, reservation_id = ?saga.reservation_id, "stock reserved");
        Ok(())
    }

    async fn process_payment(&self, order: &mut Order, saga: &mut SagaState) -> Result<()> {
        tracing::info!(order_id = %order.id, step = "process_payment", "saga step started");

        let response = self
            .payment_policy
            .call(|| {
                self.payment.process_payment(
                    order.id,
                    order.user_id,
                    order.total_amount,
                    &order.currency,
                    PaymentMethod::Card,
                    &order.order_number,
                )
            })
            .await
            .map_err(|e| {
                saga.record_retry();
                SagaError::StepFailed {
                    step: "process_payment",
                    reason: e.to_string(),
                }
            })?;

        if !response.success {
            return Err(SagaError::StepFailed {
                step: "process_payment",
                reason: response
                    .message
                    .unwrap_or_else(|| "payment declined".to_string()),
            });
        }

        saga.payment_id = response.payment_id;
        saga.advance_to(SagaStep::PaymentProcessed)?;
        self.sagas.save(saga.clone()).await?;

        order.confirm_payment(response.payment_reference.unwrap_or_default())?;
        self.orders.save(order.clone()).await?;
        tracing::info!(order_id = %order.id, payment_id = ?saga.payment_id, "payment processed");
        Ok(())
    }

    async fn complete_order(&self, order: &mut Order, saga: &mut SagaState) -> Result<()> {
        tracing::info!(order_id = %order.id, step = "complete_order", "saga step started");

        // Commit the reservation. Payment is already captured, so a commit
        // failure is logged and the order still completes.
        if let Some(reservation_id) = saga.reservation_id {
            let order_id = order.id;
            let committed = self
                .inventory_policy
                .call(|| self.inventory.commit_stock(reservation_id, order_id))
                .await;

            match committed {
                Ok(response) if response.success => {}
                Ok(response) => {
                    tracing::warn!(
                        order_id = %order.id,
                        message = ?response.message,
                        "failed to commit stock, but order is already paid"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        order_id = %order.id,
                        error = %e,
                        "failed to commit stock, but order is already paid"
                    );
                }
            }
        }

        order.mark_completed()?;
        self.orders.save(order.clone()).await?;

        saga.complete()?;
        self.sagas.save(saga.clone()).await?;

        let event = OutboxEvent::new(
            ORDER_AGGREGATE_TYPE,
            order.id.to_string(),
            ORDER_COMPLETED_EVENT,
            &OrderCompletedEvent::from_order(order),
        )?;
        self.outbox.append(event).await?;
        Ok(())
    }

    /// Walks the compensation path: refund if a payment was captured,
    /// release if stock was reserved, then mark everything terminal.
    ///
    /// Individual compensation failures are logged and skipped; the saga
    /// always reaches `Compensated` and the order `Failed`. Exactly one
    /// `OrderCancelled` outbox event is written.
    async fn compensate(
        &self,
        mut order: Order,
        mut saga: SagaState,
        reason: String,
    ) -> Result<SagaState> {
        tracing::warn!(order_id = %order.id, %reason, "saga failed, starting compensation");
        metrics::counter!("saga_compensations_total").increment(1);

        if saga.status != SagaStatus::Compensating {
            saga.begin_compensation(&reason)?;
            self.sagas.save(saga.clone()).await?;
        }

        // Undo in reverse order of the forward path: payment, then stock.
        if let Some(payment_id) = saga.payment_id
            && saga.current_step == SagaStep::CompensationStarted
        {
            let order_id = order.id;
            let amount = order.total_amount;
            let refunded = self
                .payment_policy
                .call(|| {
                    self.payment
                        .refund_payment(Some(payment_id), order_id, amount, &reason)
                })
                .await;

            match refunded {
                Ok(response) if response.success => {
                    saga.advance_to(SagaStep::PaymentRefunded)?;
                    self.sagas.save(saga.clone()).await?;
                    tracing::info!(order_id = %order.id, %payment_id, "payment refunded");
                }
                Ok(response) => {
                    saga.record_retry();
                    tracing::error!(
                        order_id = %order.id,
                        %payment_id,
                        message = ?response.message,
                        "failed to refund payment during compensation"
                    );
                }
                Err(e) => {
                    saga.record_retry();
                    tracing::error!(
                        order_id = %order.id,
                        %payment_id,
                        error = %e,
                        "failed to refund payment during compensation"
                    );
                }
            }
        }

        if let Some(reservation_id) = saga.reservation_id
            && matches!(
                saga.current_step,
                SagaStep::CompensationStarted | SagaStep::PaymentRefunded
            )
        {
            let order_id = order.id;
            let released = self
                .inventory_policy
                .call(|| self.inventory.release_stock(reservation_id, order_id, &reason))
                .await;

            match released {
                Ok(response) if response.success => {
                    saga.advance_to(SagaStep::StockReleased)?;
                    self.sagas.save(saga.clone()).await?;
                    tracing::info!(order_id = %order.id, %reservation_id, "stock released");
                }
                Ok(response) => {
                    saga.record_retry();
                    tracing::error!(
                        order_id = %order.id,
                        %reservation_id,
                        message = ?response.message,
                        "failed to release stock during compensation"
                    );
                }
                Err(e) => {
                    saga.record_retry();
                    tracing::error!(
                        order_id = %order.id,
                        %reservation_id,
                        error = %e,
                        "failed to release stock during compensation"
                    );
                }
            }
        }

        saga.finish_compensation()?;
        self.sagas.save(saga.clone()).await?;

        order.mark_failed(&reason)?;
        self.orders.save(order.clone()).await?;

        let event = OutboxEvent::new(
            ORDER_AGGREGATE_TYPE,
            order.id.to_string(),
            ORDER_CANCELLED_EVENT,
            &OrderCancelledEvent::from_order(&order, &reason),
        )?;
        self.outbox.append(event).await?;

        metrics::counter!("saga_compensated_total").increment(1);
        tracing::info!(order_id = %order.id, "compensation completed");
        Ok(saga)
    }
}
