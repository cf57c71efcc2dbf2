//! Order saga orchestration.
//!
//! This crate drives the multi-step order workflow across the user,
//! inventory, and payment collaborators:
//!
//! 1. Validate the user
//! 2. Reserve stock
//! 3. Capture payment
//! 4. Commit stock and complete the order
//!
//! The saga state is persisted after every step. If any step fails, the
//! completed side effects are compensated in reverse order (refund, then
//! release) and the saga still lands on a terminal state. Terminal outcomes
//! are announced through the transactional outbox.

pub mod error;
pub mod events;
pub mod order;
pub mod orchestrator;
pub mod policy;
pub mod services;
pub mod state;
pub mod store;

pub use error::{Result, SagaError};
pub use events::{ORDER_AGGREGATE_TYPE, OrderCancelledEvent, OrderCompletedEvent};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use orchestrator::{OrchestratorConfig, SagaOrchestrator};
pub use policy::{CallError, RemoteCallConfig, RemoteCallPolicy};
pub use services::{
    CheckStockResponse, ClientError, InMemoryUserDirectory, InventoryClient, LocalInventoryClient,
    LocalPaymentClient, PaymentClient, ProcessPaymentResponse, RefundPaymentResponse,
    ReleaseStockResponse, ReserveStockResponse, StockItem, UserClient, ValidateUserResponse,
};
pub use state::{SagaState, SagaStatus, SagaStep};
pub use store::{InMemoryOrderStore, InMemorySagaStateStore, OrderStore, SagaStateStore};
