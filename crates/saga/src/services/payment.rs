//! Payment service client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{Money, OrderId, PaymentId, UserId};
use payment::{PaymentEngine, PaymentGateway, PaymentLedger, PaymentMethod, PaymentStatus};

use super::ClientError;

/// Response to a payment request.
#[derive(Debug, Clone)]
pub struct ProcessPaymentResponse {
    /// True when the payment reached Completed.
    pub success: bool,
    pub payment_id: Option<PaymentId>,
    pub payment_reference: Option<String>,
    pub message: Option<String>,
}

/// Response to a refund request.
#[derive(Debug, Clone)]
pub struct RefundPaymentResponse {
    pub success: bool,
    pub refund_reference: Option<String>,
    pub message: Option<String>,
}

/// Client for the payment service.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Captures payment for an order, idempotently on the key.
    #[allow(clippy::too_many_arguments)]
    async fn process_payment(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: &str,
        method: PaymentMethod,
        idempotency_key: &str,
    ) -> Result<ProcessPaymentResponse, ClientError>;

    /// Refunds a captured payment (compensation).
    async fn refund_payment(
        &self,
        payment_id: Option<PaymentId>,
        order_id: OrderId,
        amount: Money,
        reason: &str,
    ) -> Result<RefundPaymentResponse, ClientError>;
}

/// In-process adapter exposing the payment engine behind the client
/// boundary.
#[derive(Clone)]
pub struct LocalPaymentClient<L, G> {
    engine: PaymentEngine<L, G>,
    unavailable: Arc<AtomicBool>,
}

impl<L, G> LocalPaymentClient<L, G>
where
    L: PaymentLedger,
    G: PaymentGateway,
{
    /// Wraps a payment engine.
    pub fn new(engine: PaymentEngine<L, G>) -> Self {
        Self {
            engine,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulates an outage of the payment service.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable(
                "payment service unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<L, G> PaymentClient for LocalPaymentClient<L, G>
where
    L: PaymentLedger + Clone + Send + Sync,
    G: PaymentGateway + Clone + Send + Sync,
{
    async fn process_payment(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: &str,
        method: PaymentMethod,
        idempotency_key: &str,
    ) -> Result<ProcessPaymentResponse, ClientError> {
        self.check_available()?;

        match self
            .engine
            .process_payment(idempotency_key, order_id, user_id, amount, currency, method)
            .await
        {
            Ok(payment) => Ok(ProcessPaymentResponse {
                success: payment.status == PaymentStatus::Completed,
                payment_id: Some(payment.payment_id),
                payment_reference: payment.payment_reference.clone(),
                message: payment.failure_reason.clone(),
            }),
            Err(e) => Err(ClientError::Unavailable(e.to_string())),
        }
    }

    async fn refund_payment(
        &self,
        payment_id: Option<PaymentId>,
        order_id: OrderId,
        amount: Money,
        reason: &str,
    ) -> Result<RefundPaymentResponse, ClientError> {
        self.check_available()?;

        match self
            .engine
            .refund_payment(payment_id, order_id, amount, reason)
            .await
        {
            Ok(refunded) => Ok(RefundPaymentResponse {
                success: true,
                refund_reference: refunded.refund_reference.clone(),
                message: None,
            }),
            // Business rejections (not refundable, already refunded) come
            // back as an unsuccessful response, not a transport error.
            Err(e) => Ok(RefundPaymentResponse {
                success: false,
                refund_reference: None,
                message: Some(e.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payment::{InMemoryPaymentLedger, SimulatedGateway};

    fn client() -> LocalPaymentClient<InMemoryPaymentLedger, SimulatedGateway> {
        LocalPaymentClient::new(PaymentEngine::new(
            InMemoryPaymentLedger::new(),
            SimulatedGateway::new(),
        ))
    }

    #[tokio::test]
    async fn successful_payment_reports_reference() {
        let client = client();
        let response = client
            .process_payment(
                OrderId::new(),
                UserId::new(),
                Money::from_cents(5000),
                "USD",
                PaymentMethod::Card,
                "ORD-1",
            )
            .await
            .unwrap();

        assert!(response.success);
        assert!(response.payment_reference.unwrap().starts_with("PAY-"));
    }

    #[tokio::test]
    async fn refund_of_unrefundable_payment_is_a_rejection() {
        let client = client();
        let response = client
            .refund_payment(None, OrderId::new(), Money::from_cents(100), "n/a")
            .await
            .unwrap();

        assert!(!response.success);
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn outage_is_a_transport_error() {
        let client = client();
        client.set_unavailable(true);

        let err = client
            .process_payment(
                OrderId::new(),
                UserId::new(),
                Money::from_cents(5000),
                "USD",
                PaymentMethod::Card,
                "ORD-2",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));
    }
}
