//! Background publisher draining the outbox to the bus.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::bus::MessageBus;
use crate::error::Result;
use crate::event::topic_for_event_type;
use crate::store::OutboxStore;

/// Outbox publisher configuration.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Poll period for the background loop.
    pub poll_interval: Duration,
    /// Maximum rows drained per poll.
    pub batch_size: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
        }
    }
}

/// Polls the outbox and ships events to the bus, at-least-once.
///
/// A row is marked processed only after its send is acknowledged; a send
/// failure leaves the row unprocessed for the next poll. Downstream
/// consumers must therefore be idempotent on the event ID.
#[derive(Clone)]
pub struct OutboxPublisher<S, B> {
    store: S,
    bus: B,
    config: OutboxConfig,
}

impl<S, B> OutboxPublisher<S, B>
where
    S: OutboxStore,
    B: MessageBus,
{
    /// Creates a publisher over the given store and bus.
    pub fn new(store: S, bus: B, config: OutboxConfig) -> Self {
        Self { store, bus, config }
    }

    /// Drains one batch of pending events.
    ///
    /// Returns the number of events published. Rows that fail to send are
    /// logged and left in place; later rows are still attempted, so one
    /// poisoned aggregate cannot stall the whole outbox.
    pub async fn run_once(&self) -> Result<usize> {
        let pending = self.store.fetch_unprocessed(self.config.batch_size).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = pending.len(), "publishing outbox events");

        let mut published = 0;
        for event in pending {
            let topic = topic_for_event_type(&event.event_type);

            match self
                .bus
                .publish(topic, &event.aggregate_id, &event.payload)
                .await
            {
                Ok(()) => {
                    self.store.mark_processed(event.id).await?;
                    published += 1;
                    metrics::counter!("outbox_published_total").increment(1);
                    tracing::debug!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        topic,
                        "outbox event published"
                    );
                }
                Err(e) => {
                    // Left unprocessed; the next poll retries it.
                    metrics::counter!("outbox_publish_failures_total").increment(1);
                    tracing::error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %e,
                        "failed to publish outbox event"
                    );
                }
            }
        }

        Ok(published)
    }
}

/// Spawns the publisher as a background task polling on a fixed interval
/// until the shutdown channel fires.
pub fn spawn_outbox_publisher<S, B>(
    publisher: OutboxPublisher<S, B>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: OutboxStore + Clone + Send + Sync + 'static,
    B: MessageBus + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(publisher.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match publisher.run_once().await {
                        Ok(0) => {}
                        Ok(count) => tracing::debug!(count, "outbox batch published"),
                        Err(e) => tracing::error!(error = %e, "outbox poll failed"),
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("outbox publisher shutting down");
                    break;
                }
            }
        }
    })
}
