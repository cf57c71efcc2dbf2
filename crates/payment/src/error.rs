//! Payment error types.

use common::{OrderId, PaymentId};
use thiserror::Error;

use crate::payment::PaymentStatus;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No payment record exists for the ID.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// No refundable payment exists for the order.
    #[error("no refundable payment found for order: {0}")]
    NoRefundablePayment(OrderId),

    /// The payment is not in a refundable state.
    #[error("payment {payment_id} cannot be refunded from status {status}")]
    NotRefundable {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    /// The payment was already refunded once.
    #[error("payment {0} has already been refunded")]
    AlreadyRefunded(PaymentId),

    /// The gateway could not be reached or failed at the transport level.
    #[error("payment gateway error: {0}")]
    Gateway(String),
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
