//! Payment records.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::Wallet => "Wallet",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a payment in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──┬──► Completed ──► Refunded
///                          └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Recorded but not yet sent to the gateway.
    #[default]
    Pending,
    /// The gateway capture is in flight.
    Processing,
    /// Captured; the only state a refund can start from.
    Completed,
    /// The gateway declined the capture (terminal state).
    Failed,
    /// The capture was refunded (terminal state).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if a refund can start from this state.
    pub fn can_be_refunded(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Returns true once the record can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment record keyed by its idempotency key.
///
/// At most one payment per key ever reaches Completed; the ledger enforces
/// key uniqueness and the engine performs the capture only for the record
/// that won the insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment identifier.
    pub payment_id: PaymentId,
    /// Caller-supplied token making the request repeatable.
    pub idempotency_key: String,
    /// Order this payment belongs to.
    pub order_id: OrderId,
    /// Paying user.
    pub user_id: UserId,
    /// Captured amount.
    pub amount: Money,
    /// ISO currency code.
    pub currency: String,
    /// Payment method.
    pub method: PaymentMethod,
    /// Current state.
    pub status: PaymentStatus,
    /// Gateway reference assigned on successful capture.
    pub payment_reference: Option<String>,
    /// Gateway reason assigned on decline.
    pub failure_reason: Option<String>,
    /// Gateway reference assigned on refund.
    pub refund_reference: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a Processing record about to be sent to the gateway.
    pub fn new_processing(
        idempotency_key: impl Into<String>,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: impl Into<String>,
        method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            payment_id: PaymentId::new(),
            idempotency_key: idempotency_key.into(),
            order_id,
            user_id,
            amount,
            currency: currency.into(),
            method,
            status: PaymentStatus::Processing,
            payment_reference: None,
            failure_reason: None,
            refund_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if a refund can start from the current state.
    pub fn can_be_refunded(&self) -> bool {
        self.status.can_be_refunded()
    }

    /// Marks the capture successful.
    pub fn mark_successful(&mut self, payment_reference: impl Into<String>) {
        self.status = PaymentStatus::Completed;
        self.payment_reference = Some(payment_reference.into());
        self.updated_at = Utc::now();
    }

    /// Marks the capture declined.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Marks the payment refunded.
    pub fn mark_refunded(&mut self, refund_reference: impl Into<String>) {
        self.status = PaymentStatus::Refunded;
        self.refund_reference = Some(refund_reference.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Payment {
        Payment::new_processing(
            "ORD-123",
            OrderId::new(),
            UserId::new(),
            Money::from_cents(5000),
            "USD",
            PaymentMethod::Card,
        )
    }

    #[test]
    fn new_payment_is_processing() {
        let payment = sample();
        assert_eq!(payment.status, PaymentStatus::Processing);
        assert!(!payment.can_be_refunded());
        assert!(payment.payment_reference.is_none());
    }

    #[test]
    fn successful_capture_is_refundable() {
        let mut payment = sample();
        payment.mark_successful("PAY-ABCD1234");
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.can_be_refunded());
        assert_eq!(payment.payment_reference.as_deref(), Some("PAY-ABCD1234"));
    }

    #[test]
    fn failed_and_refunded_are_terminal() {
        let mut declined = sample();
        declined.mark_failed("Card declined");
        assert!(declined.status.is_terminal());
        assert!(!declined.can_be_refunded());

        let mut refunded = sample();
        refunded.mark_successful("PAY-1");
        refunded.mark_refunded("REF-1");
        assert!(refunded.status.is_terminal());
        assert_eq!(refunded.refund_reference.as_deref(), Some("REF-1"));
    }

    #[test]
    fn serialization_roundtrip() {
        let payment = sample();
        let json = serde_json::to_string(&payment).unwrap();
        let deserialized: Payment = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.payment_id, payment.payment_id);
        assert_eq!(deserialized.status, PaymentStatus::Processing);
    }
}
