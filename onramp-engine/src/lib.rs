//! Onramp Engine Layer
//!
//! The order fulfillment and ledger reconciliation core:
//!
//! - **OrderValidator**: raw notification → validated `Order`, silent
//!   ignore, or classified rejection
//! - **FulfillmentEngine**: inventory-backed purchase loop, delivery,
//!   and pot bookkeeping, serialized behind a single lock
//! - **RefundCoordinator**: best-effort money-back path for any failure
//! - **OrderProcessor**: the three wired together, one call per webhook
//!
//! All external effects go through the ports in `onramp-exec`; swap in
//! stubs for deterministic tests.

#![warn(clippy::all)]

pub mod error;
pub mod fulfill;
pub mod processor;
pub mod refund;
pub mod validate;

// Re-exports for convenience
pub use error::{FulfillError, OrderError, OrderFailure, ValidationError};
pub use fulfill::{FulfillConfig, FulfillReceipt, FulfillmentEngine, COMMISSION_RATE};
pub use processor::{Outcome, OrderProcessor};
pub use refund::RefundCoordinator;
pub use validate::{OrderValidator, Rejection, Screened, ACCEPTED_CURRENCY};
