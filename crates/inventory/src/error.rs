//! Inventory error types.

use common::{ProductId, ReservationId};
use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No stock counter exists for the product.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A stock counter already exists for the product.
    #[error("product already registered: {0}")]
    ProductAlreadyRegistered(ProductId),

    /// Not enough available stock to satisfy the request.
    #[error(
        "insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// A counter write raced another writer; the whole read-modify-write
    /// cycle must be retried.
    #[error("version conflict for product {product_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        product_id: ProductId,
        expected: u64,
        actual: u64,
    },

    /// Attempted to move more quantity out of `reserved` than is held there.
    #[error(
        "cannot {action} more than reserved for product {product_id}: reserved {reserved}, requested {requested}"
    )]
    ExceedsReserved {
        action: &'static str,
        product_id: ProductId,
        reserved: u32,
        requested: u32,
    },

    /// No reservation rows exist for the given ID.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// A batch reservation failed part-way through.
    ///
    /// Rows written before the failing product remain Active under
    /// `reservation_id`; the caller compensates them with `release`.
    #[error("batch reservation {reservation_id} failed on product {product_id}: {source}")]
    BatchReserveFailed {
        reservation_id: ReservationId,
        product_id: ProductId,
        #[source]
        source: Box<InventoryError>,
    },
}

impl InventoryError {
    /// Returns true for conflicts worth retrying locally.
    pub fn is_conflict(&self) -> bool {
        matches!(self, InventoryError::VersionConflict { .. })
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
