//! Payment engine with idempotency handling.

use common::{Money, OrderId, PaymentId, UserId};

use crate::error::{PaymentError, Result};
use crate::gateway::{CaptureOutcome, PaymentGateway};
use crate::ledger::{InsertOutcome, PaymentLedger};
use crate::payment::{Payment, PaymentMethod, PaymentStatus};

/// Processes and refunds payments.
///
/// Effectively-once capture is built on the ledger, not the gateway: the
/// record that wins `insert_if_absent` for an idempotency key is the only
/// one whose capture is executed, and every replay of the key gets that
/// record back unchanged.
#[derive(Clone)]
pub struct PaymentEngine<L, G> {
    ledger: L,
    gateway: G,
}

impl<L, G> PaymentEngine<L, G>
where
    L: PaymentLedger,
    G: PaymentGateway,
{
    /// Creates a new engine over the given ledger and gateway.
    pub fn new(ledger: L, gateway: G) -> Self {
        Self { ledger, gateway }
    }

    /// Returns a reference to the underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Processes a payment, replaying idempotently on a repeated key.
    ///
    /// A repeated key returns the stored record without touching the
    /// gateway, even if that record is still Processing (a concurrent first
    /// call owns the capture). A fresh key claims the ledger entry, runs the
    /// capture once, and lands on Completed or Failed.
    #[tracing::instrument(skip(self, amount))]
    pub async fn process_payment(
        &self,
        idempotency_key: &str,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: &str,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let candidate =
            Payment::new_processing(idempotency_key, order_id, user_id, amount, currency, method);

        let mut payment = match self.ledger.insert_if_absent(candidate.clone()).await? {
            InsertOutcome::Existing(existing) => {
                tracing::info!(
                    payment_id = %existing.payment_id,
                    status = %existing.status,
                    "payment already processed, returning existing record"
                );
                metrics::counter!("payment_idempotent_replays_total").increment(1);
                return Ok(existing);
            }
            InsertOutcome::Inserted => candidate,
        };

        match self.gateway.capture(order_id, amount, method).await? {
            CaptureOutcome::Approved { reference } => {
                payment.mark_successful(&reference);
                metrics::counter!("payments_completed_total").increment(1);
                tracing::info!(payment_id = %payment.payment_id, %reference, "payment captured");
            }
            CaptureOutcome::Declined { reason } => {
                payment.mark_failed(&reason);
                metrics::counter!("payments_failed_total").increment(1);
                tracing::warn!(payment_id = %payment.payment_id, %reason, "payment declined");
            }
        }

        self.ledger.update(payment.clone()).await?;
        Ok(payment)
    }

    /// Refunds a completed payment exactly once.
    ///
    /// The payment is found by ID when one is given, otherwise by scanning
    /// the order for a refundable record. Refunding anything but a Completed
    /// payment fails; a second refund surfaces as `AlreadyRefunded` rather
    /// than being silently ignored.
    #[tracing::instrument(skip(self, amount))]
    pub async fn refund_payment(
        &self,
        payment_id: Option<PaymentId>,
        order_id: OrderId,
        amount: Money,
        reason: &str,
    ) -> Result<Payment> {
        let mut payment = match payment_id {
            Some(id) => self
                .ledger
                .get(id)
                .await?
                .ok_or(PaymentError::PaymentNotFound(id))?,
            None => self
                .ledger
                .find_by_order(order_id)
                .await?
                .into_iter()
                .find(Payment::can_be_refunded)
                .ok_or(PaymentError::NoRefundablePayment(order_id))?,
        };

        match payment.status {
            PaymentStatus::Refunded => {
                return Err(PaymentError::AlreadyRefunded(payment.payment_id));
            }
            PaymentStatus::Completed => {}
            status => {
                return Err(PaymentError::NotRefundable {
                    payment_id: payment.payment_id,
                    status,
                });
            }
        }

        let capture_reference = payment.payment_reference.clone().unwrap_or_default();
        let refund_reference = self.gateway.refund(&capture_reference, amount).await?;

        payment.mark_refunded(&refund_reference);
        self.ledger.update(payment.clone()).await?;

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(
            payment_id = %payment.payment_id,
            %refund_reference,
            reason,
            "payment refunded"
        );
        Ok(payment)
    }

    /// Returns the current record for a payment.
    pub async fn payment_status(&self, payment_id: PaymentId) -> Result<Payment> {
        self.ledger
            .get(payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))
    }
}
