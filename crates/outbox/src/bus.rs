//! Message bus boundary.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{OutboxError, Result};

/// Topic-based publish boundary.
///
/// Any broker with topics and per-key ordering can satisfy this; an `Ok`
/// return means the send was acknowledged.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a payload to a topic, keyed for partition ordering.
    async fn publish(&self, topic: &str, key: &str, payload: &serde_json::Value) -> Result<()>;
}

/// A message captured by the in-memory bus.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct BusState {
    messages: Vec<PublishedMessage>,
    fail_sends: bool,
}

/// In-memory message bus for tests and the demo binary.
#[derive(Clone, Default)]
pub struct InMemoryMessageBus {
    state: Arc<RwLock<BusState>>,
}

impl InMemoryMessageBus {
    /// Creates a new bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail until cleared.
    pub async fn set_fail_sends(&self, fail: bool) {
        self.state.write().await.fail_sends = fail;
    }

    /// Returns all delivered messages.
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.state.read().await.messages.clone()
    }

    /// Returns delivered messages for one topic.
    pub async fn messages_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, key: &str, payload: &serde_json::Value) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_sends {
            return Err(OutboxError::Bus("simulated send failure".to_string()));
        }
        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}
