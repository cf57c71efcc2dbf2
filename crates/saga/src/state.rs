//! Saga state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, ReservationId};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Steps of the order saga.
///
/// Forward path:
/// ```text
/// OrderCreated ──► UserValidated ──► StockReserved ──► PaymentProcessed ──► OrderCompleted
/// ```
/// Any forward step can divert to `CompensationStarted`; compensation then
/// walks backward through what actually completed:
/// ```text
/// CompensationStarted ──► PaymentRefunded ──► StockReleased ──► CompensationCompleted
/// ```
/// (refund and release are skipped when there is nothing to undo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStep {
    /// Saga created alongside the order.
    #[default]
    OrderCreated,
    /// The user was validated.
    UserValidated,
    /// Stock was reserved.
    StockReserved,
    /// Payment was captured.
    PaymentProcessed,
    /// The order completed (terminal step).
    OrderCompleted,
    /// A step failed; compensation is underway.
    CompensationStarted,
    /// The captured payment was refunded.
    PaymentRefunded,
    /// The stock reservation was released.
    StockReleased,
    /// Compensation finished (terminal step).
    CompensationCompleted,
}

impl SagaStep {
    /// Returns true if the saga may move from this step to `next`.
    ///
    /// Steps only advance along the forward or compensation path; they
    /// never skip a required step or move backward.
    pub fn can_advance_to(&self, next: SagaStep) -> bool {
        use SagaStep::*;
        matches!(
            (*self, next),
            (OrderCreated, UserValidated)
                | (UserValidated, StockReserved)
                | (StockReserved, PaymentProcessed)
                | (PaymentProcessed, OrderCompleted)
                | (OrderCreated, CompensationStarted)
                | (UserValidated, CompensationStarted)
                | (StockReserved, CompensationStarted)
                | (PaymentProcessed, CompensationStarted)
                | (CompensationStarted, PaymentRefunded)
                | (CompensationStarted, StockReleased)
                | (CompensationStarted, CompensationCompleted)
                | (PaymentRefunded, StockReleased)
                | (PaymentRefunded, CompensationCompleted)
                | (StockReleased, CompensationCompleted)
        )
    }

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::OrderCreated => "OrderCreated",
            SagaStep::UserValidated => "UserValidated",
            SagaStep::StockReserved => "StockReserved",
            SagaStep::PaymentProcessed => "PaymentProcessed",
            SagaStep::OrderCompleted => "OrderCompleted",
            SagaStep::CompensationStarted => "CompensationStarted",
            SagaStep::PaymentRefunded => "PaymentRefunded",
            SagaStep::StockReleased => "StockReleased",
            SagaStep::CompensationCompleted => "CompensationCompleted",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Saga execution status.
///
/// Status transitions: `Started → Completed` or
/// `Started → Compensating → Compensated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Forward steps are executing.
    #[default]
    Started,
    /// All steps completed (terminal state).
    Completed,
    /// The saga failed without compensation (terminal state).
    Failed,
    /// A step failed; compensating actions are in progress.
    Compensating,
    /// Compensation finished after a failure (terminal state).
    Compensated,
}

impl SagaStatus {
    /// Returns true for states the saga never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "Started",
            SagaStatus::Completed => "Completed",
            SagaStatus::Failed => "Failed",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable state of one saga run, one-to-one with an order.
///
/// Persisted after every step so a crash mid-saga can resume from the last
/// durable step and determine what must be compensated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaState {
    /// Order this saga is driving.
    pub order_id: OrderId,
    /// Last step that completed durably.
    pub current_step: SagaStep,
    /// Overall saga status.
    pub status: SagaStatus,
    /// Reservation recorded after the stock step.
    pub reservation_id: Option<ReservationId>,
    /// Payment recorded after the payment step.
    pub payment_id: Option<PaymentId>,
    /// The causing error once the saga diverts to compensation.
    pub error_message: Option<String>,
    /// Number of failed remote attempts observed across the run.
    pub retry_count: u32,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl SagaState {
    /// Creates the initial state for an order.
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            current_step: SagaStep::OrderCreated,
            status: SagaStatus::Started,
            reservation_id: None,
            payment_id: None,
            error_message: None,
            retry_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns true once the saga reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Advances to the next step, enforcing the step graph.
    pub fn advance_to(&mut self, next: SagaStep) -> Result<(), SagaError> {
        if !self.current_step.can_advance_to(next) {
            return Err(SagaError::InvalidStepTransition {
                from: self.current_step,
                to: next,
            });
        }
        self.current_step = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the forward path complete.
    pub fn complete(&mut self) -> Result<(), SagaError> {
        self.advance_to(SagaStep::OrderCompleted)?;
        self.status = SagaStatus::Completed;
        Ok(())
    }

    /// Diverts the saga to the compensation path, recording the cause.
    pub fn begin_compensation(&mut self, error: impl Into<String>) -> Result<(), SagaError> {
        self.advance_to(SagaStep::CompensationStarted)?;
        self.status = SagaStatus::Compensating;
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Marks the compensation path complete.
    pub fn finish_compensation(&mut self) -> Result<(), SagaError> {
        self.advance_to(SagaStep::CompensationCompleted)?;
        self.status = SagaStatus::Compensated;
        Ok(())
    }

    /// Records one failed remote attempt.
    pub fn record_retry(&mut self) {
        self.retry_count += 1;
        self.updated_at = Utc::now();
    }
}
