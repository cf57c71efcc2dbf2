//! Transactional outbox.
//!
//! Domain events are appended to a durable store alongside the state change
//! that produced them, then shipped to the message bus by a background
//! publisher. Rows are marked processed only after the bus acknowledges the
//! send, which makes delivery at-least-once: a crash between insert and
//! publish leaves the row unprocessed for the next poll.

pub mod bus;
pub mod error;
pub mod event;
pub mod publisher;
pub mod store;

pub use bus::{InMemoryMessageBus, MessageBus, PublishedMessage};
pub use error::{OutboxError, Result};
pub use event::{OutboxEvent, topic_for_event_type};
pub use publisher::{OutboxConfig, OutboxPublisher, spawn_outbox_publisher};
pub use store::{InMemoryOutboxStore, OutboxStore};
