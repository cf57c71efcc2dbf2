//! Outbox store trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{OutboxError, Result};
use crate::event::OutboxEvent;

/// Durable append-only store for outbox rows.
///
/// The publisher is the only writer that flips `processed`, so there is no
/// contention with the writers inserting events.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Appends a row.
    async fn append(&self, event: OutboxEvent) -> Result<()>;

    /// Returns up to `limit` unprocessed rows in `created_at` order.
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<OutboxEvent>>;

    /// Flips `processed` on a row. Call only after a confirmed send.
    async fn mark_processed(&self, id: Uuid) -> Result<()>;
}

/// In-memory outbox store.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    events: Arc<RwLock<Vec<OutboxEvent>>>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all rows, for tests.
    pub async fn all_events(&self) -> Vec<OutboxEvent> {
        self.events.read().await.clone()
    }

    /// Returns the number of unprocessed rows.
    pub async fn unprocessed_count(&self) -> usize {
        self.events.read().await.iter().filter(|e| !e.processed).count()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn append(&self, event: OutboxEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<OutboxEvent>> {
        let events = self.events.read().await;
        let mut pending: Vec<_> = events.iter().filter(|e| !e.processed).cloned().collect();
        // Insertion order breaks created_at ties, keeping per-aggregate order.
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(OutboxError::EventNotFound(id))?;
        event.mark_processed();
        Ok(())
    }
}
