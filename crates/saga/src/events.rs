//! Outbox payloads for terminal saga outcomes.

use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::order::Order;

/// Aggregate type recorded on order outbox rows.
pub const ORDER_AGGREGATE_TYPE: &str = "Order";

/// Event type name for a completed order.
pub const ORDER_COMPLETED_EVENT: &str = "OrderCompleted";

/// Event type name for a cancelled order.
pub const ORDER_CANCELLED_EVENT: &str = "OrderCancelled";

/// Published when an order saga completes successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub total_amount: Money,
    pub currency: String,
    pub payment_reference: Option<String>,
}

impl OrderCompletedEvent {
    /// Builds the payload from a completed order.
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            total_amount: order.total_amount,
            currency: order.currency.clone(),
            payment_reference: order.payment_reference.clone(),
        }
    }
}

/// Published when an order saga is compensated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub reason: String,
}

impl OrderCancelledEvent {
    /// Builds the payload from a failed order and the causing error.
    pub fn from_order(order: &Order, reason: impl Into<String>) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            reason: reason.into(),
        }
    }
}
