//! Saga error types.

use common::OrderId;
use thiserror::Error;

use crate::order::OrderError;
use crate::state::SagaStep;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order is not in a state the saga can start from.
    #[error("order not ready: {0}")]
    OrderNotReady(String),

    /// No saga state exists for the order.
    #[error("no saga found for order: {0}")]
    SagaNotFound(OrderId),

    /// Attempted a step transition the graph does not allow.
    #[error("invalid saga step transition: {from} -> {to}")]
    InvalidStepTransition { from: SagaStep, to: SagaStep },

    /// A saga step failed; compensation follows.
    #[error("saga step '{step}' failed: {reason}")]
    StepFailed { step: &'static str, reason: String },

    /// Order state error.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// Outbox error.
    #[error("outbox error: {0}")]
    Outbox(#[from] outbox::OutboxError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
