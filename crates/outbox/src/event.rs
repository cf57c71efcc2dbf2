//! Outbox event rows and topic resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A domain event awaiting publication.
///
/// Written in the same local transaction as the state change it describes;
/// `processed` flips only after a confirmed send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Unique row identifier.
    pub id: Uuid,
    /// Kind of aggregate the event belongs to (e.g. "Order").
    pub aggregate_type: String,
    /// Identifier of the aggregate; also used as the bus partition key, so
    /// per-aggregate ordering is preserved downstream.
    pub aggregate_id: String,
    /// Event type name (e.g. "OrderCompleted").
    pub event_type: String,
    /// JSON event payload.
    pub payload: serde_json::Value,
    /// True once the bus acknowledged the send.
    pub processed: bool,
    /// When the send was acknowledged.
    pub processed_at: Option<DateTime<Utc>>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    /// Creates an unprocessed row, serializing the payload.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: &impl Serialize,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            payload: serde_json::to_value(payload)?,
            processed: false,
            processed_at: None,
            created_at: Utc::now(),
        })
    }

    /// Marks the row as delivered.
    pub fn mark_processed(&mut self) {
        self.processed = true;
        self.processed_at = Some(Utc::now());
    }
}

/// Resolves the destination topic for an event type.
pub fn topic_for_event_type(event_type: &str) -> &'static str {
    match event_type {
        "OrderCreated" => "order.created",
        "OrderCompleted" => "order.completed",
        "OrderCancelled" => "order.cancelled",
        _ => "order.events",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct SamplePayload {
        order_id: &'static str,
        reason: &'static str,
    }

    #[test]
    fn new_event_is_unprocessed() {
        let event = OutboxEvent::new(
            "Order",
            "order-1",
            "OrderCancelled",
            &SamplePayload {
                order_id: "order-1",
                reason: "payment declined",
            },
        )
        .unwrap();

        assert!(!event.processed);
        assert!(event.processed_at.is_none());
        assert_eq!(event.payload["reason"], "payment declined");
    }

    #[test]
    fn mark_processed_stamps_time() {
        let mut event =
            OutboxEvent::new("Order", "order-1", "OrderCompleted", &serde_json::json!({}))
                .unwrap();
        event.mark_processed();
        assert!(event.processed);
        assert!(event.processed_at.is_some());
    }

    #[test]
    fn topic_resolution() {
        assert_eq!(topic_for_event_type("OrderCreated"), "order.created");
        assert_eq!(topic_for_event_type("OrderCompleted"), "order.completed");
        assert_eq!(topic_for_event_type("OrderCancelled"), "order.cancelled");
        assert_eq!(topic_for_event_type("SomethingElse"), "order.events");
    }
}
