//! Shared types used across the order saga services.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, PaymentId, ProductId, ReservationId, UserId};
