//! Order model.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by order state transitions.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order is in a state that does not allow the transition.
    #[error("order {order_id} cannot {action} from status {status}")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },
}

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Completed
///    │            │
///    └────────────┴──► Cancelled / Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Created, saga not finished yet.
    #[default]
    Pending,
    /// Payment captured, completion in progress.
    Confirmed,
    /// Fulfilled (terminal state).
    Completed,
    /// Cancelled by request (terminal state).
    Cancelled,
    /// The saga failed and was compensated (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true once the order can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line item on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Ordered product.
    pub product_id: ProductId,
    /// Product name for display.
    pub product_name: String,
    /// Ordered quantity.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a line item.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the line subtotal.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order placed by a user.
///
/// Created by the caller before the saga starts and mutated only by the
/// orchestrator from then on. Terminal statuses are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Human-facing order number; doubles as the payment idempotency key.
    pub order_number: String,
    /// User who placed the order.
    pub user_id: UserId,
    /// Current status.
    pub status: OrderStatus,
    /// Ordered items.
    pub items: Vec<OrderItem>,
    /// Sum of line subtotals.
    pub total_amount: Money,
    /// ISO currency code.
    pub currency: String,
    /// Gateway reference once payment is captured.
    pub payment_reference: Option<String>,
    /// Why the order ended Cancelled/Failed, if it did.
    pub cancellation_reason: Option<String>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a Pending order, computing the total from the items.
    pub fn new(user_id: UserId, items: Vec<OrderItem>, currency: impl Into<String>) -> Self {
        let total_amount = items
            .iter()
            .fold(Money::zero(), |sum, item| sum.add(item.subtotal()));

        Self {
            id: OrderId::new(),
            order_number: generate_order_number(),
            user_id,
            status: OrderStatus::Pending,
            items,
            total_amount,
            currency: currency.into(),
            payment_reference: None,
            cancellation_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Returns true if the order has items.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Records the payment gateway reference and confirms the order.
    pub fn confirm_payment(
        &mut self,
        payment_reference: impl Into<String>,
    ) -> Result<(), OrderError> {
        self.guard("confirm payment for", OrderStatus::Pending)?;
        self.payment_reference = Some(payment_reference.into());
        self.status = OrderStatus::Confirmed;
        Ok(())
    }

    /// Marks the order completed.
    pub fn mark_completed(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Confirmed && self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action: "complete",
            });
        }
        self.status = OrderStatus::Completed;
        Ok(())
    }

    /// Marks the order failed with the causing error.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action: "fail",
            });
        }
        self.status = OrderStatus::Failed;
        self.cancellation_reason = Some(reason.into());
        Ok(())
    }

    /// Marks the order cancelled with a reason.
    pub fn mark_cancelled(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action: "cancel",
            });
        }
        self.status = OrderStatus::Cancelled;
        self.cancellation_reason = Some(reason.into());
        Ok(())
    }

    fn guard(&self, action: &'static str, expected: OrderStatus) -> Result<(), OrderError> {
        if self.status != expected {
            return Err(OrderError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action,
            });
        }
        Ok(())
    }
}

fn generate_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::new(
            UserId::new(),
            vec![
                OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000)),
                OrderItem::new("SKU-002", "Gadget", 1, Money::from_cents(2500)),
            ],
            "USD",
        )
    }

    #[test]
    fn new_order_totals_items_and_gets_a_number() {
        let order = sample_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount.cents(), 4500);
        assert!(order.order_number.starts_with("ORD-"));
        assert!(order.has_items());
    }

    #[test]
    fn full_lifecycle() {
        let mut order = sample_order();
        order.confirm_payment("PAY-ABCD1234").unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_reference.as_deref(), Some("PAY-ABCD1234"));

        order.mark_completed().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.status.is_terminal());
    }

    #[test]
    fn failed_order_records_reason() {
        let mut order = sample_order();
        order.mark_failed("Payment declined").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(
            order.cancellation_reason.as_deref(),
            Some("Payment declined")
        );
    }

    #[test]
    fn terminal_orders_are_immutable() {
        let mut order = sample_order();
        order.mark_completed().unwrap();

        assert!(order.mark_failed("too late").is_err());
        assert!(order.mark_cancelled("too late").is_err());
        assert!(order.confirm_payment("PAY-X").is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let order = sample_order();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, order.id);
        assert_eq!(deserialized.total_amount, order.total_amount);
    }
}
