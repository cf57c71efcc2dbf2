//! Outbox error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the outbox layer.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// No outbox row exists with the given ID.
    #[error("outbox event not found: {0}")]
    EventNotFound(Uuid),

    /// The message bus rejected or failed a send.
    #[error("message bus error: {0}")]
    Bus(String),

    /// An event payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for outbox results.
pub type Result<T> = std::result::Result<T, OutboxError>;
