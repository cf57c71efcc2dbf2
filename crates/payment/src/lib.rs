//! Payment processing.
//!
//! Payments are keyed by a caller-supplied idempotency key: the ledger's
//! conditional insert is the claim point, so a repeated request returns the
//! original record and the gateway capture runs at most once per key.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod payment;

pub use engine::PaymentEngine;
pub use error::{PaymentError, Result};
pub use gateway::{CaptureOutcome, PaymentGateway, SimulatedGateway};
pub use ledger::{InMemoryPaymentLedger, InsertOutcome, PaymentLedger};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
