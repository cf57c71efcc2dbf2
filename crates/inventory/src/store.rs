//! Inventory store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, ReservationId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{InventoryError, Result};
use crate::reservation::Reservation;

/// Per-product stock counter.
///
/// Invariant: `available + reserved == total`, all non-negative. The mutation
/// methods preserve it; the `version` is bumped by the store on every
/// successful conditional write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    /// Product this counter tracks.
    pub product_id: ProductId,
    /// Product name for display.
    pub product_name: String,
    /// Units free to reserve.
    pub available: u32,
    /// Units held by active reservations.
    pub reserved: u32,
    /// Units physically in the system.
    pub total: u32,
    /// Optimistic-lock version; a write with a stale version is rejected.
    pub version: u64,
}

impl StockLevel {
    /// Creates a counter with all stock available.
    pub fn new(product_id: ProductId, product_name: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            available: quantity,
            reserved: 0,
            total: quantity,
            version: 1,
        }
    }

    /// Returns true if `quantity` units can be reserved.
    pub fn is_available(&self, quantity: u32) -> bool {
        self.available >= quantity
    }

    /// Moves `quantity` units from available to reserved.
    pub fn reserve(&mut self, quantity: u32) -> Result<()> {
        if self.available < quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: self.product_id.clone(),
                available: self.available,
                requested: quantity,
            });
        }
        self.available -= quantity;
        self.reserved += quantity;
        Ok(())
    }

    /// Returns `quantity` reserved units to available stock.
    pub fn release(&mut self, quantity: u32) -> Result<()> {
        if self.reserved < quantity {
            return Err(InventoryError::ExceedsReserved {
                action: "release",
                product_id: self.product_id.clone(),
                reserved: self.reserved,
                requested: quantity,
            });
        }
        self.reserved -= quantity;
        self.available += quantity;
        Ok(())
    }

    /// Finalizes the sale of `quantity` reserved units; stock leaves the
    /// system.
    pub fn commit(&mut self, quantity: u32) -> Result<()> {
        if self.reserved < quantity {
            return Err(InventoryError::ExceedsReserved {
                action: "commit",
                product_id: self.product_id.clone(),
                reserved: self.reserved,
                requested: quantity,
            });
        }
        self.reserved -= quantity;
        self.total -= quantity;
        Ok(())
    }

    /// Adds replenishment stock.
    pub fn add_stock(&mut self, quantity: u32) {
        self.available += quantity;
        self.total += quantity;
    }
}

/// Persistence boundary for stock counters and reservation rows.
///
/// The conditional counter write is the only coordination primitive the
/// engine needs: implementations reject a write whose expected version does
/// not match the stored one, and the engine turns that conflict into a
/// retried read-modify-write.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Returns the counter for a product, if registered.
    async fn get_stock(&self, product_id: &ProductId) -> Result<Option<StockLevel>>;

    /// Registers a new counter. Fails if the product already exists.
    async fn insert_stock(&self, stock: StockLevel) -> Result<()>;

    /// Writes the counter only if the stored version equals
    /// `expected_version`; the stored version is bumped on success.
    async fn put_stock_if_version(&self, stock: StockLevel, expected_version: u64) -> Result<()>;

    /// Inserts a reservation row.
    async fn insert_reservation(&self, reservation: Reservation) -> Result<()>;

    /// Replaces the row matching `reservation_id` + `product_id`.
    async fn update_reservation(&self, reservation: Reservation) -> Result<()>;

    /// Returns all rows under a reservation ID.
    async fn reservations_by_id(&self, reservation_id: ReservationId) -> Result<Vec<Reservation>>;

    /// Returns active rows whose `expires_at` is at or before `now`.
    async fn expired_active_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>>;
}

#[derive(Default)]
struct InMemoryState {
    stock: HashMap<ProductId, StockLevel>,
    reservations: Vec<Reservation>,
}

/// In-memory inventory store.
///
/// Provides the same interface a database-backed implementation would; the
/// version check happens inside the write lock, so it is atomic with respect
/// to concurrent writers.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of reservation rows, for tests.
    pub async fn reservation_row_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get_stock(&self, product_id: &ProductId) -> Result<Option<StockLevel>> {
        Ok(self.state.read().await.stock.get(product_id).cloned())
    }

    async fn insert_stock(&self, stock: StockLevel) -> Result<()> {
        let mut state = self.state.write().await;
        if state.stock.contains_key(&stock.product_id) {
            return Err(InventoryError::ProductAlreadyRegistered(
                stock.product_id.clone(),
            ));
        }
        state.stock.insert(stock.product_id.clone(), stock);
        Ok(())
    }

    async fn put_stock_if_version(
        &self,
        mut stock: StockLevel,
        expected_version: u64,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state
            .stock
            .get(&stock.product_id)
            .ok_or_else(|| InventoryError::ProductNotFound(stock.product_id.clone()))?;

        if current.version != expected_version {
            return Err(InventoryError::VersionConflict {
                product_id: stock.product_id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }

        stock.version = expected_version + 1;
        state.stock.insert(stock.product_id.clone(), stock);
        Ok(())
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<()> {
        self.state.write().await.reservations.push(reservation);
        Ok(())
    }

    async fn update_reservation(&self, reservation: Reservation) -> Result<()> {
        let mut state = self.state.write().await;
        let slot = state
            .reservations
            .iter_mut()
            .find(|r| {
                r.reservation_id == reservation.reservation_id
                    && r.product_id == reservation.product_id
            })
            .ok_or(InventoryError::ReservationNotFound(
                reservation.reservation_id,
            ))?;
        *slot = reservation;
        Ok(())
    }

    async fn reservations_by_id(&self, reservation_id: ReservationId) -> Result<Vec<Reservation>> {
        Ok(self
            .state
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.reservation_id == reservation_id)
            .cloned()
            .collect())
    }

    async fn expired_active_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        Ok(self
            .state
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.is_expired_at(now))
            .cloned()
            .collect())
    }
}
