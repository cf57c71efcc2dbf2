//! Order and saga-state persistence boundaries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::order::Order;
use crate::state::SagaState;

/// Persistence boundary for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts or replaces an order.
    async fn save(&self, order: Order) -> Result<()>;

    /// Returns an order by ID.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;
}

/// Persistence boundary for saga states, one per order.
#[async_trait]
pub trait SagaStateStore: Send + Sync {
    /// Inserts or replaces the saga state for its order.
    async fn save(&self, state: SagaState) -> Result<()>;

    /// Returns the saga state for an order.
    async fn get(&self, order_id: OrderId) -> Result<Option<SagaState>>;
}

/// In-memory order store.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: Order) -> Result<()> {
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }
}

/// In-memory saga state store.
#[derive(Clone, Default)]
pub struct InMemorySagaStateStore {
    states: Arc<RwLock<HashMap<OrderId, SagaState>>>,
}

impl InMemorySagaStateStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SagaStateStore for InMemorySagaStateStore {
    async fn save(&self, state: SagaState) -> Result<()> {
        self.states.write().await.insert(state.order_id, state);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<SagaState>> {
        Ok(self.states.read().await.get(&order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderItem;
    use common::{Money, UserId};

    #[tokio::test]
    async fn order_store_roundtrip() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(
            UserId::new(),
            vec![OrderItem::new(
                "SKU-001",
                "Widget",
                1,
                Money::from_cents(500),
            )],
            "USD",
        );
        let order_id = order.id;

        assert!(store.get(order_id).await.unwrap().is_none());
        store.save(order).await.unwrap();
        assert!(store.get(order_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn saga_state_store_replaces_on_save() {
        let store = InMemorySagaStateStore::new();
        let order_id = OrderId::new();
        let mut state = SagaState::new(order_id);
        store.save(state.clone()).await.unwrap();

        state.advance_to(crate::state::SagaStep::UserValidated).unwrap();
        store.save(state).await.unwrap();

        let loaded = store.get(order_id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, crate::state::SagaStep::UserValidated);
    }
}
