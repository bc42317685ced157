//! Onramp Execution Layer
//!
//! Capability ports for the external collaborators the core consumes,
//! plus deterministic stubs and idempotency key sources.
//!
//! # Components
//!
//! - **Ports**: Traits for exchange, ledger, operational feed, and
//!   access-code resolution
//! - **Stubs**: Test implementations recording every call
//! - **Keys**: Monotonic idempotency key sources (in-memory and
//!   file-backed)
//! - **Access**: File-backed access-code registry

#![warn(clippy::all)]

pub mod access;
pub mod error;
pub mod keys;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use access::FsAccessCodes;
pub use error::{AccessCodeError, ExchangeError, FeedError, LedgerError};
pub use keys::{CounterKeys, FileBackedKeys};
pub use ports::{AccessCodeStore, ExchangeClient, FeedClient, IdempotencyKeys, LedgerClient};
pub use stub::{MemoryAccessCodes, Movement, StubExchange, StubFeed, StubLedger};
