//! Stock reservation engine.
//!
//! Tracks per-product stock counters under optimistic concurrency control:
//! every counter write is conditioned on an unchanged version, and conflicts
//! are absorbed by retrying the whole read-modify-write cycle with backoff.
//! Reservations are held against the counter until they are committed
//! (sale final), released (compensation), or reclaimed by the expiry sweep.

pub mod engine;
pub mod error;
pub mod reservation;
pub mod store;
pub mod sweep;

pub use engine::{ReservationConfig, ReservationEngine};
pub use error::{InventoryError, Result};
pub use reservation::{Reservation, ReservationStatus};
pub use store::{InMemoryInventoryStore, InventoryStore, StockLevel};
pub use sweep::spawn_expiry_sweep;
