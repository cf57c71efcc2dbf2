//! Payment ledger trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PaymentId};
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::payment::Payment;

/// Outcome of a conditional ledger insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The key was free; the new record was stored.
    Inserted,
    /// The key was already claimed; here is the stored record.
    Existing(Payment),
}

/// Persistence boundary for payment records.
///
/// `insert_if_absent` is the idempotency point: it must atomically either
/// claim the key or return the record that already claimed it, so no two
/// callers can both believe they own the capture.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Stores `payment` if its idempotency key is unclaimed; otherwise
    /// returns the existing record untouched.
    async fn insert_if_absent(&self, payment: Payment) -> Result<InsertOutcome>;

    /// Replaces an existing record.
    async fn update(&self, payment: Payment) -> Result<()>;

    /// Returns a record by payment ID.
    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>>;

    /// Returns a record by idempotency key.
    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>>;

    /// Returns all records for an order.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;
}

#[derive(Default)]
struct LedgerState {
    payments: HashMap<PaymentId, Payment>,
    by_key: HashMap<String, PaymentId>,
}

/// In-memory payment ledger.
#[derive(Clone, Default)]
pub struct InMemoryPaymentLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryPaymentLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored payments, for tests.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn insert_if_absent(&self, payment: Payment) -> Result<InsertOutcome> {
        let mut state = self.state.write().await;

        if let Some(existing_id) = state.by_key.get(&payment.idempotency_key) {
            let existing = state.payments[existing_id].clone();
            return Ok(InsertOutcome::Existing(existing));
        }

        state
            .by_key
            .insert(payment.idempotency_key.clone(), payment.payment_id);
        state.payments.insert(payment.payment_id, payment);
        Ok(InsertOutcome::Inserted)
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.payments.contains_key(&payment.payment_id) {
            return Err(PaymentError::PaymentNotFound(payment.payment_id));
        }
        state.payments.insert(payment.payment_id, payment);
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&payment_id).cloned())
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }
}
