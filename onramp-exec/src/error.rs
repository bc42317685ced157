//! Execution layer error types.

use std::time::Duration;
use thiserror::Error;

use onramp_domain::Pot;

/// Errors from exchange operations (price, buy, transfer-out).
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// Exchange API rejected the request
    #[error("Exchange API error: {0}")]
    Api(String),

    /// Transport-level failure before a response was received
    #[error("Exchange transport error: {0}")]
    Transport(String),

    /// Call exceeded its deadline; the outcome may be unknown
    #[error("Exchange call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from ledger pot movements.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The pot deposit/withdrawal was rejected
    #[error("Failed to move {delta} to pot {pot}: {message}")]
    Movement {
        /// Target pot
        pot: Pot,
        /// Signed delta that failed to apply
        delta: onramp_domain::Pence,
        /// Provider error detail
        message: String,
    },

    /// Transport-level failure before a response was received
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// Call exceeded its deadline
    #[error("Ledger call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from the operational notification feed. Always best-effort.
#[derive(Debug, Clone, Error)]
#[error("Feed post failed: {0}")]
pub struct FeedError(pub String);

/// Errors from access-code resolution.
#[derive(Debug, Clone, Error)]
#[error("Access code lookup failed: {0}")]
pub struct AccessCodeError(pub String);
