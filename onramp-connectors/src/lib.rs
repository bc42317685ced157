//! Onramp Connectors Layer
//!
//! Live adapters behind the `onramp-exec` ports:
//!
//! - **CoinbaseExchange**: price quotes, market buys, and crypto
//!   withdrawals against a Coinbase Exchange-style REST API
//! - **MonzoLedger**: pot deposits/withdrawals and feed items against a
//!   Monzo-style REST API
//!
//! Both carry the caller's idempotency keys through to the provider
//! where the API supports it.

#![warn(clippy::all)]

pub mod coinbase;
pub mod monzo;

// Re-exports for convenience
pub use coinbase::CoinbaseExchange;
pub use monzo::MonzoLedger;
