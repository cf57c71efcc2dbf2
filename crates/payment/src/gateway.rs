//! Payment gateway boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::payment::PaymentMethod;

/// Gateway verdict on a capture attempt.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// Funds captured; the gateway assigned a reference.
    Approved { reference: String },
    /// The gateway declined the capture.
    Declined { reason: String },
}

/// External payment gateway.
///
/// `Err` from either call means the gateway could not be reached; a decline
/// is a normal `CaptureOutcome::Declined`, not an error.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempts to capture funds for an order.
    async fn capture(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<CaptureOutcome>;

    /// Refunds a previous capture, returning the refund reference.
    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<String>;
}

fn gateway_reference(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{prefix}-{suffix}")
}

#[derive(Default)]
struct SimulatedState {
    decline_reason: Option<String>,
}

/// Simulated gateway for tests and the demo binary.
///
/// Approves everything by default; [`set_decline`](Self::set_decline) scripts
/// a decline. Counts captures and refunds so tests can assert the side effect
/// ran at most once.
#[derive(Clone, Default)]
pub struct SimulatedGateway {
    state: Arc<RwLock<SimulatedState>>,
    captures: Arc<AtomicUsize>,
    refunds: Arc<AtomicUsize>,
    processing_delay: Duration,
}

impl SimulatedGateway {
    /// Creates a gateway that approves every capture instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that sleeps before answering, to simulate a slow
    /// processor.
    pub fn with_delay(processing_delay: Duration) -> Self {
        Self {
            processing_delay,
            ..Self::default()
        }
    }

    /// Scripts the next captures to be declined with `reason`; `None`
    /// restores approvals.
    pub async fn set_decline(&self, reason: Option<&str>) {
        self.state.write().await.decline_reason = reason.map(str::to_string);
    }

    /// Returns the number of capture attempts that reached the gateway.
    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Returns the number of refunds that reached the gateway.
    pub fn refund_count(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn capture(
        &self,
        order_id: OrderId,
        amount: Money,
        _method: PaymentMethod,
    ) -> Result<CaptureOutcome> {
        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        self.captures.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.state.read().await.decline_reason.clone() {
            tracing::debug!(%order_id, %amount, %reason, "simulated capture declined");
            return Ok(CaptureOutcome::Declined { reason });
        }

        let reference = gateway_reference("PAY");
        tracing::debug!(%order_id, %amount, %reference, "simulated capture approved");
        Ok(CaptureOutcome::Approved { reference })
    }

    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<String> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        let reference = gateway_reference("REF");
        tracing::debug!(payment_reference, %amount, refund_reference = %reference, "simulated refund");
        Ok(reference)
    }
}
