//! Engine error taxonomy.
//!
//! Three classes, matching how failures route:
//! - `ValidationError` — the notification never became an order; routes
//!   to the refund path (except the amount <= 0 case, which is a silent
//!   ignore handled before any error is raised).
//! - `FulfillError` — the order failed mid-fulfillment; routes to the
//!   refund path. Delivery failures are flagged separately because the
//!   asset may or may not have been sent.
//! - `OrderError` — the terminal result reported upward after the
//!   refund path ran (or could not run).

use thiserror::Error;

use onramp_domain::{AmountPolicy, Pence};
use onramp_exec::{ExchangeError, LedgerError};

// =============================================================================
// Validation
// =============================================================================

/// Why a notification was rejected during validation.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Body did not decode into the expected notification shape
    #[error("Failed to parse notification body: {0}")]
    MalformedPayload(String),

    /// Notification type is not `transaction.created`
    #[error("Unexpected webhook type: {0}")]
    UnexpectedType(String),

    /// Counterparty sort code or account number missing
    #[error("Counterparty data missing")]
    MissingCounterparty,

    /// Amount outside the configured acceptance policy
    #[error("Invalid amount {amount}. Send {policy}")]
    AmountOutOfPolicy {
        /// The offered amount
        amount: Pence,
        /// The configured policy it failed
        policy: AmountPolicy,
    },

    /// Currency is not GBP
    #[error("Wrong currency {0}. Send GBP only")]
    WrongCurrency(String),

    /// Reference is neither a destination address nor a known access code
    #[error("Reference must be a destination address or a registered access code: {0:?}")]
    UnresolvableDestination(String),
}

// =============================================================================
// Fulfillment
// =============================================================================

/// Why fulfillment of a validated order failed.
///
/// Steps are not transactional: ledger and inventory changes applied
/// before the failing step stay applied (drift is logged, reconciled
/// manually).
#[derive(Debug, Error)]
pub enum FulfillError {
    /// The price query failed; nothing was bought or moved. Safe to retry.
    #[error("Price query failed: {0}")]
    PriceQuery(#[source] ExchangeError),

    /// A purchase-loop buy failed; movements from earlier iterations
    /// remain applied.
    #[error("Purchase failed after {completed_chunks} filled chunk(s): {source}")]
    Purchase {
        /// Underlying exchange failure
        #[source]
        source: ExchangeError,
        /// Chunks bought (and booked) before the failure
        completed_chunks: u32,
    },

    /// The asset transfer-out failed. When `outcome_unknown` is set the
    /// asset may or may not have been sent; never blindly retry.
    #[error("Delivery failed ({}): {source}", if *.outcome_unknown { "outcome unknown" } else { "rejected" })]
    Delivery {
        /// Underlying exchange failure
        #[source]
        source: ExchangeError,
        /// True for timeouts/transport failures where the asset may
        /// have been sent anyway
        outcome_unknown: bool,
    },

    /// A pot movement failed mid-fulfillment, aborting the call.
    #[error("Ledger write failed: {0}")]
    Ledger(#[from] LedgerError),
}

// =============================================================================
// Combined cause
// =============================================================================

/// Whatever stopped an order: validation or fulfillment.
#[derive(Debug, Error)]
pub enum OrderFailure {
    /// The notification failed validation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The validated order failed fulfillment
    #[error("{0}")]
    Fulfill(#[from] FulfillError),
}

// =============================================================================
// Terminal result
// =============================================================================

/// Terminal error for one notification, reported to logs and the
/// operational feed. No variant triggers an automatic retry.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Refund deposited; the triggering failure is still surfaced for
    /// visibility and alerting.
    #[error("Order refunded. Cause: {cause}")]
    Refunded {
        /// What stopped the order
        cause: OrderFailure,
    },

    /// Not enough counterparty identity to route a refund; requires a
    /// human operator.
    #[error(
        "An error occurred but there is not enough counterparty information \
         to issue a refund: {cause}"
    )]
    Unrecoverable {
        /// What stopped the order
        cause: OrderFailure,
    },

    /// The refund deposit itself failed.
    #[error("Failed to deposit into refund pot: {deposit}. Original error: {cause}")]
    RefundFailed {
        /// The failed refund-pot write
        deposit: LedgerError,
        /// What stopped the order
        cause: OrderFailure,
    },
}
