//! Collaborator client traits and in-process adapters for saga steps.

pub mod inventory;
pub mod payment;
pub mod user;

use thiserror::Error;

pub use inventory::{
    CheckStockResponse, InventoryClient, LocalInventoryClient, ReleaseStockResponse,
    ReserveStockResponse, StockItem,
};
pub use payment::{LocalPaymentClient, PaymentClient, ProcessPaymentResponse, RefundPaymentResponse};
pub use user::{InMemoryUserDirectory, UserClient, ValidateUserResponse};

/// Transport-level failure talking to a collaborator.
///
/// Business outcomes (insufficient stock, declined payment, invalid user)
/// come back inside the response structs; this error means the collaborator
/// could not be reached at all.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The service is unreachable or failed out-of-band.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}
