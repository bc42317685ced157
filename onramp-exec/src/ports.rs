//! Execution layer port definitions.
//!
//! Ports define the interfaces for external services (exchange, ledger,
//! operational feed, access-code registry). Adapters implement these
//! ports for specific providers (Coinbase, Monzo, stubs, etc.).

use async_trait::async_trait;

use onramp_domain::{DestinationAddress, Pence, Pot};

use crate::error::{AccessCodeError, ExchangeError, FeedError, LedgerError};

// =============================================================================
// Exchange Port
// =============================================================================

/// Port for exchange operations (price lookup, fixed-size buys, asset
/// transfer-out).
///
/// Implementations:
/// - `StubExchange` - For testing (immediate fills at configured price)
/// - `CoinbaseExchange` - Live REST adapter (onramp-connectors)
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Current unit price of the asset in fiat for a product pair
    /// (e.g. `ETH-GBP`).
    async fn get_price(&self, product: &str) -> Result<f64, ExchangeError>;

    /// Execute a fixed-size market purchase of `fiat` worth of asset.
    ///
    /// # Returns
    ///
    /// The filled asset amount.
    async fn buy(&self, fiat: Pence) -> Result<f64, ExchangeError>;

    /// Transfer `amount` of asset out to a destination address.
    ///
    /// A failure here is an unknown-outcome case: the asset may or may
    /// not have left the exchange. Callers must never blindly retry.
    async fn send_asset(
        &self,
        amount: f64,
        to: &DestinationAddress,
    ) -> Result<(), ExchangeError>;
}

// =============================================================================
// Ledger Port
// =============================================================================

/// Port for named-pot balance movement with idempotent writes.
///
/// Implementations:
/// - `StubLedger` - For testing (records movements, conservation checks)
/// - `MonzoLedger` - Live REST adapter (onramp-connectors)
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Apply a signed delta to a pot.
    ///
    /// # Arguments
    ///
    /// * `pot` - Target sub-account
    /// * `delta` - Signed integer-pence movement (negative = withdrawal)
    /// * `idempotency_key` - Unique token so a retried write is not
    ///   double-applied by the provider
    async fn move_to_pot(
        &self,
        pot: Pot,
        delta: Pence,
        idempotency_key: &str,
    ) -> Result<(), LedgerError>;
}

// =============================================================================
// Feed Port
// =============================================================================

/// Port for the operational notification feed.
///
/// Best-effort by contract: a failure to post is only logged by
/// callers, never propagated.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Post a human-readable informational item.
    async fn post_info(&self, title: &str, body: &str) -> Result<(), FeedError>;

    /// Post an error item for operator attention.
    async fn post_error(&self, message: &str) -> Result<(), FeedError>;
}

// =============================================================================
// Access Code Port
// =============================================================================

/// Port for resolving short access codes to registered destination
/// addresses.
#[async_trait]
pub trait AccessCodeStore: Send + Sync {
    /// Resolve a code to its registered address, if any.
    async fn resolve(&self, code: &str) -> Result<Option<DestinationAddress>, AccessCodeError>;
}

// =============================================================================
// Idempotency Keys
// =============================================================================

/// Source of idempotency keys for external ledger writes.
///
/// Keys issued by a single source are strictly increasing and never
/// reused within the process lifetime. Durability across restarts is
/// implementation-defined: `CounterKeys` reseeds at startup (the legacy
/// behavior), `FileBackedKeys` persists its high-water mark so a
/// crash-restart cannot hand out a key that may already have been
/// applied by the provider.
pub trait IdempotencyKeys: Send + Sync {
    /// Allocate the next key. Never returns the same key twice.
    fn next_key(&self) -> String;
}
