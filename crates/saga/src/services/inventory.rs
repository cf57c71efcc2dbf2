//! Inventory service client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{OrderId, ProductId, ReservationId};
use inventory::{InventoryError, InventoryStore, ReservationEngine};

use super::ClientError;

/// One product line in a reservation request.
#[derive(Debug, Clone)]
pub struct StockItem {
    /// Product to reserve.
    pub product_id: ProductId,
    /// Quantity to reserve.
    pub quantity: u32,
}

/// Response to a stock reservation request.
///
/// On failure, `reservation_id` may still be set: a batch that failed
/// part-way reports the ID covering the rows it did write, so the caller
/// can release them.
#[derive(Debug, Clone)]
pub struct ReserveStockResponse {
    pub success: bool,
    pub reservation_id: Option<ReservationId>,
    pub message: Option<String>,
}

/// Response to a release or commit request.
#[derive(Debug, Clone)]
pub struct ReleaseStockResponse {
    pub success: bool,
    pub message: Option<String>,
}

/// Response to a stock check.
#[derive(Debug, Clone)]
pub struct CheckStockResponse {
    pub available: u32,
    pub reserved: u32,
    pub total: u32,
}

/// Client for the inventory service.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Reserves stock for an order's items.
    async fn reserve_stock(
        &self,
        order_id: OrderId,
        items: &[StockItem],
    ) -> Result<ReserveStockResponse, ClientError>;

    /// Releases a reservation (compensation).
    async fn release_stock(
        &self,
        reservation_id: ReservationId,
        order_id: OrderId,
        reason: &str,
    ) -> Result<ReleaseStockResponse, ClientError>;

    /// Commits a reservation (sale final).
    async fn commit_stock(
        &self,
        reservation_id: ReservationId,
        order_id: OrderId,
    ) -> Result<ReleaseStockResponse, ClientError>;

    /// Returns the stock counters for a product.
    async fn check_stock(&self, product_id: &ProductId)
    -> Result<CheckStockResponse, ClientError>;
}

/// In-process adapter exposing the reservation engine behind the client
/// boundary, as the orchestrator would reach it over RPC.
#[derive(Clone)]
pub struct LocalInventoryClient<S> {
    engine: ReservationEngine<S>,
    unavailable: Arc<AtomicBool>,
}

impl<S: InventoryStore> LocalInventoryClient<S> {
    /// Wraps a reservation engine.
    pub fn new(engine: ReservationEngine<S>) -> Self {
        Self {
            engine,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulates an outage of the inventory service.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable(
                "inventory service unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> InventoryClient for LocalInventoryClient<S>
where
    S: InventoryStore + Clone + Send + Sync,
{
    async fn reserve_stock(
        &self,
        order_id: OrderId,
        items: &[StockItem],
    ) -> Result<ReserveStockResponse, ClientError> {
        self.check_available()?;

        let pairs: Vec<(ProductId, u32)> = items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();

        match self.engine.reserve_batch(order_id, &pairs).await {
            Ok(reservation_id) => Ok(ReserveStockResponse {
                success: true,
                reservation_id: Some(reservation_id),
                message: None,
            }),
            Err(InventoryError::BatchReserveFailed {
                reservation_id,
                product_id,
                source,
            }) => Ok(ReserveStockResponse {
                success: false,
                reservation_id: Some(reservation_id),
                message: Some(format!("product {product_id}: {source}")),
            }),
            Err(e) => Ok(ReserveStockResponse {
                success: false,
                reservation_id: None,
                message: Some(e.to_string()),
            }),
        }
    }

    async fn release_stock(
        &self,
        reservation_id: ReservationId,
        order_id: OrderId,
        reason: &str,
    ) -> Result<ReleaseStockResponse, ClientError> {
        self.check_available()?;
        tracing::debug!(%reservation_id, %order_id, reason, "releasing stock");

        match self.engine.release(reservation_id).await {
            Ok(()) => Ok(ReleaseStockResponse {
                success: true,
                message: None,
            }),
            Err(e) => Ok(ReleaseStockResponse {
                success: false,
                message: Some(e.to_string()),
            }),
        }
    }

    async fn commit_stock(
        &self,
        reservation_id: ReservationId,
        order_id: OrderId,
    ) -> Result<ReleaseStockResponse, ClientError> {
        self.check_available()?;
        tracing::debug!(%reservation_id, %order_id, "committing stock");

        match self.engine.commit(reservation_id).await {
            Ok(()) => Ok(ReleaseStockResponse {
                success: true,
                message: None,
            }),
            Err(e) => Ok(ReleaseStockResponse {
                success: false,
                message: Some(e.to_string()),
            }),
        }
    }

    async fn check_stock(
        &self,
        product_id: &ProductId,
    ) -> Result<CheckStockResponse, ClientError> {
        self.check_available()?;

        match self.engine.check_stock(product_id).await {
            Ok(stock) => Ok(CheckStockResponse {
                available: stock.available,
                reserved: stock.reserved,
                total: stock.total,
            }),
            Err(e) => Err(ClientError::Unavailable(e.to_string())),
        }
    }
}
