//! Reservation engine with optimistic concurrency control.

use std::time::Duration;

use chrono::Utc;
use common::{OrderId, ProductId, ReservationId};
use resilience::RetryPolicy;

use crate::error::{InventoryError, Result};
use crate::reservation::Reservation;
use crate::store::{InventoryStore, StockLevel};

/// Reservation engine configuration.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// How long a reservation holds stock before the sweep reclaims it.
    pub reservation_ttl: Duration,
    /// Retry policy for counter writes that hit a version conflict.
    pub retry: RetryPolicy,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::from_secs(15 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Reserves, releases, and commits stock against per-product counters.
///
/// Counter updates use compare-and-swap on the counter version instead of a
/// lock: a conflicting write makes the engine re-read the counter and retry
/// the whole read-modify-write cycle with backoff, so concurrent writers are
/// serialized without lost updates or overselling.
#[derive(Clone)]
pub struct ReservationEngine<S> {
    store: S,
    config: ReservationConfig,
}

impl<S: InventoryStore> ReservationEngine<S> {
    /// Creates a new engine over the given store.
    pub fn new(store: S, config: ReservationConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a product with an initial stock quantity.
    #[tracing::instrument(skip(self))]
    pub async fn register_product(
        &self,
        product_id: ProductId,
        product_name: &str,
        quantity: u32,
    ) -> Result<()> {
        self.store
            .insert_stock(StockLevel::new(product_id, product_name, quantity))
            .await
    }

    /// Adds replenishment stock to a product counter.
    #[tracing::instrument(skip(self))]
    pub async fn add_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockLevel> {
        self.mutate_counter(product_id, |stock| {
            stock.add_stock(quantity);
            Ok(())
        })
        .await
    }

    /// Returns the current counter for a product.
    pub async fn check_stock(&self, product_id: &ProductId) -> Result<StockLevel> {
        self.store
            .get_stock(product_id)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    /// Reserves `quantity` units of a single product for an order.
    ///
    /// Fails fast with `InsufficientStock` when the counter cannot cover the
    /// request; version conflicts are retried internally. On success an
    /// Active reservation row is created with `expires_at = now + ttl`.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        order_id: OrderId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ReservationId> {
        let reservation_id = ReservationId::new();
        self.reserve_row(reservation_id, order_id, product_id, quantity)
            .await?;

        tracing::info!(%reservation_id, %order_id, %product_id, quantity, "stock reserved");
        Ok(reservation_id)
    }

    /// Reserves several products under one reservation ID.
    ///
    /// NOT atomic across products: each product is reserved independently,
    /// and a mid-batch failure returns `BatchReserveFailed` carrying the
    /// reservation ID while rows written so far stay Active. The caller
    /// compensates them with [`release`](Self::release); otherwise the
    /// expiry sweep reclaims them at TTL.
    #[tracing::instrument(skip(self, items))]
    pub async fn reserve_batch(
        &self,
        order_id: OrderId,
        items: &[(ProductId, u32)],
    ) -> Result<ReservationId> {
        let reservation_id = ReservationId::new();

        for (product_id, quantity) in items {
            if let Err(e) = self
                .reserve_row(reservation_id, order_id, product_id, *quantity)
                .await
            {
                return Err(InventoryError::BatchReserveFailed {
                    reservation_id,
                    product_id: product_id.clone(),
                    source: Box::new(e),
                });
            }
        }

        tracing::info!(%reservation_id, %order_id, products = items.len(), "batch reserved");
        Ok(reservation_id)
    }

    /// Releases a reservation, returning held stock to available.
    ///
    /// Idempotent: rows that already left Active are skipped, and an unknown
    /// reservation ID is a logged no-op (compensation can race expiry).
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, reservation_id: ReservationId) -> Result<()> {
        let rows = self.store.reservations_by_id(reservation_id).await?;
        if rows.is_empty() {
            tracing::warn!(%reservation_id, "release of unknown reservation, nothing to do");
            return Ok(());
        }

        for mut row in rows {
            if !row.is_active() {
                continue;
            }

            let quantity = row.quantity;
            self.mutate_counter(&row.product_id, |stock| stock.release(quantity))
                .await?;

            row.mark_released();
            self.store.update_reservation(row).await?;
            metrics::counter!("stock_released_total").increment(1);
        }

        tracing::info!(%reservation_id, "reservation released");
        Ok(())
    }

    /// Commits a reservation: the sale is final and stock leaves the system.
    ///
    /// Rows that already left Active are skipped with a warning; an unknown
    /// reservation ID is an error, since a sale must never silently finalize
    /// nothing.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, reservation_id: ReservationId) -> Result<()> {
        let rows = self.store.reservations_by_id(reservation_id).await?;
        if rows.is_empty() {
            return Err(InventoryError::ReservationNotFound(reservation_id));
        }

        for mut row in rows {
            if !row.is_active() {
                tracing::warn!(
                    %reservation_id,
                    product_id = %row.product_id,
                    status = %row.status,
                    "reservation row already processed, skipping commit"
                );
                continue;
            }

            let quantity = row.quantity;
            self.mutate_counter(&row.product_id, |stock| stock.commit(quantity))
                .await?;

            row.mark_committed();
            self.store.update_reservation(row).await?;
            metrics::counter!("stock_committed_total").increment(1);
        }

        tracing::info!(%reservation_id, "reservation committed");
        Ok(())
    }

    /// Releases every active reservation whose TTL has lapsed.
    ///
    /// Tolerates partial failure: a row that cannot be reclaimed is logged
    /// and left for the next sweep. Returns the number of rows expired.
    pub async fn run_expiry_sweep(&self) -> Result<usize> {
        let now = Utc::now();
        let rows = self.store.expired_active_reservations(now).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        tracing::info!(count = rows.len(), "found expired reservations");

        let mut expired = 0;
        for row in rows {
            let reservation_id = row.reservation_id;
            let product_id = row.product_id.clone();
            match self.expire_row(row).await {
                Ok(()) => {
                    expired += 1;
                    metrics::counter!("reservations_expired_total").increment(1);
                }
                Err(e) => {
                    tracing::error!(
                        %reservation_id,
                        %product_id,
                        error = %e,
                        "failed to expire reservation row"
                    );
                }
            }
        }

        Ok(expired)
    }

    async fn expire_row(&self, mut row: Reservation) -> Result<()> {
        let quantity = row.quantity;
        self.mutate_counter(&row.product_id, |stock| stock.release(quantity))
            .await?;
        row.mark_expired();
        self.store.update_reservation(row).await
    }

    async fn reserve_row(
        &self,
        reservation_id: ReservationId,
        order_id: OrderId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<()> {
        self.mutate_counter(product_id, |stock| stock.reserve(quantity))
            .await?;

        let expires_at = Utc::now() + self.config.reservation_ttl;
        let reservation =
            Reservation::new(reservation_id, order_id, product_id.clone(), quantity, expires_at);
        self.store.insert_reservation(reservation).await?;
        metrics::counter!("stock_reserved_total").increment(1);
        Ok(())
    }

    /// Runs one counter mutation under the version-retry discipline.
    ///
    /// The whole read-modify-write cycle is retried on conflict, not just
    /// the write: a stale read must never be written back.
    async fn mutate_counter<F>(&self, product_id: &ProductId, mutate: F) -> Result<StockLevel>
    where
        F: Fn(&mut StockLevel) -> Result<()>,
    {
        self.config
            .retry
            .run(
                |e: &InventoryError| {
                    if e.is_conflict() {
                        metrics::counter!("stock_version_conflicts_total").increment(1);
                        true
                    } else {
                        false
                    }
                },
                || async {
                    let mut stock = self
                        .store
                        .get_stock(product_id)
                        .await?
                        .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))?;
                    let expected = stock.version;
                    mutate(&mut stock)?;

                    let updated = stock.clone();
                    self.store.put_stock_if_version(stock, expected).await?;
                    Ok(updated)
                },
            )
            .await
    }
}
