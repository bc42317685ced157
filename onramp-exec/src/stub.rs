//! Stub implementations for testing.
//!
//! These implementations simulate exchange, ledger, feed, and
//! access-code behavior without making real API calls. They record
//! every call so tests can assert money conservation and delivery.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use onramp_domain::{DestinationAddress, Pence, Pot};

use crate::error::{AccessCodeError, ExchangeError, FeedError, LedgerError};
use crate::ports::{AccessCodeStore, ExchangeClient, FeedClient, LedgerClient};

// =============================================================================
// Stub Exchange
// =============================================================================

/// Stub exchange for testing.
///
/// Simulates immediate fills at a configured price and tracks the
/// exchange-held asset balance plus per-destination deliveries.
pub struct StubExchange {
    /// Current unit price of the asset
    price: RwLock<f64>,
    /// Asset held at the exchange
    balance: RwLock<f64>,
    /// Delivered asset per destination (hex form)
    deliveries: RwLock<HashMap<String, f64>>,
    /// Products passed to get_price
    products_queried: RwLock<Vec<String>>,
    /// Successful buy count
    buys: RwLock<u32>,
    /// Whether price queries fail
    fail_price: RwLock<bool>,
    /// Fail buys once this many have succeeded
    fail_buy_after: RwLock<Option<u32>>,
    /// Whether transfers out fail with an API rejection
    fail_send: RwLock<bool>,
    /// Whether transfers out fail at the transport level (outcome
    /// unknown to the caller)
    fail_send_transport: RwLock<bool>,
}

impl StubExchange {
    /// Create a stub exchange with a fixed unit price.
    pub fn new(price: f64) -> Self {
        Self {
            price: RwLock::new(price),
            balance: RwLock::new(0.0),
            deliveries: RwLock::new(HashMap::new()),
            products_queried: RwLock::new(Vec::new()),
            buys: RwLock::new(0),
            fail_price: RwLock::new(false),
            fail_buy_after: RwLock::new(None),
            fail_send: RwLock::new(false),
            fail_send_transport: RwLock::new(false),
        }
    }

    /// Create a stub exchange holding an initial asset balance.
    pub fn with_balance(price: f64, balance: f64) -> Self {
        let stub = Self::new(price);
        *stub.balance.write().unwrap() = balance;
        stub
    }

    /// Change the quoted price.
    pub fn set_price(&self, price: f64) {
        *self.price.write().unwrap() = price;
    }

    /// Make price queries fail.
    pub fn set_fail_price(&self, fail: bool) {
        *self.fail_price.write().unwrap() = fail;
    }

    /// Make buys fail once `n` have succeeded (0 = fail immediately).
    pub fn fail_buy_after(&self, n: u32) {
        *self.fail_buy_after.write().unwrap() = Some(n);
    }

    /// Make transfers out fail with an API rejection.
    pub fn set_fail_send(&self, fail: bool) {
        *self.fail_send.write().unwrap() = fail;
    }

    /// Make transfers out fail at the transport level, before any
    /// response is received.
    pub fn set_fail_send_transport(&self, fail: bool) {
        *self.fail_send_transport.write().unwrap() = fail;
    }

    /// Asset currently held at the exchange.
    pub fn balance(&self) -> f64 {
        *self.balance.read().unwrap()
    }

    /// Asset delivered to a destination so far.
    pub fn delivered_to(&self, to: &DestinationAddress) -> f64 {
        self.deliveries
            .read()
            .unwrap()
            .get(&to.to_hex())
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of successful buys.
    pub fn buy_count(&self) -> u32 {
        *self.buys.read().unwrap()
    }

    /// Products passed to get_price, in call order.
    pub fn products_queried(&self) -> Vec<String> {
        self.products_queried.read().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeClient for StubExchange {
    async fn get_price(&self, product: &str) -> Result<f64, ExchangeError> {
        if *self.fail_price.read().unwrap() {
            return Err(ExchangeError::Api("simulated price failure".to_string()));
        }

        self.products_queried
            .write()
            .unwrap()
            .push(product.to_string());

        Ok(*self.price.read().unwrap())
    }

    async fn buy(&self, fiat: Pence) -> Result<f64, ExchangeError> {
        {
            let buys = self.buys.read().unwrap();
            if let Some(limit) = *self.fail_buy_after.read().unwrap() {
                if *buys >= limit {
                    return Err(ExchangeError::Api("simulated buy failure".to_string()));
                }
            }
        }

        let filled = fiat.as_major_units() / *self.price.read().unwrap();
        *self.balance.write().unwrap() += filled;
        *self.buys.write().unwrap() += 1;

        Ok(filled)
    }

    async fn send_asset(
        &self,
        amount: f64,
        to: &DestinationAddress,
    ) -> Result<(), ExchangeError> {
        if *self.fail_send_transport.read().unwrap() {
            return Err(ExchangeError::Transport(
                "simulated connection reset".to_string(),
            ));
        }
        if *self.fail_send.read().unwrap() {
            return Err(ExchangeError::Api("simulated send failure".to_string()));
        }

        *self.balance.write().unwrap() -= amount;
        *self
            .deliveries
            .write()
            .unwrap()
            .entry(to.to_hex())
            .or_insert(0.0) += amount;

        tracing::debug!(amount, to = %to, "Stub: asset sent");
        Ok(())
    }
}

// =============================================================================
// Stub Ledger
// =============================================================================

/// One recorded pot movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    /// Target pot
    pub pot: Pot,
    /// Signed delta applied
    pub delta: Pence,
    /// Idempotency key the write carried
    pub key: String,
}

/// Stub ledger for testing.
///
/// Records every movement and maintains a main-account balance that
/// decreases by each delta, so tests can assert that an order's pot
/// deltas conserve the original amount.
pub struct StubLedger {
    movements: RwLock<Vec<Movement>>,
    balance: RwLock<Pence>,
    /// Whether all movements fail
    fail: RwLock<bool>,
    /// Fail movements once this many have been applied
    fail_after: RwLock<Option<usize>>,
}

impl StubLedger {
    /// Create a stub ledger with a zero main-account balance.
    pub fn new() -> Self {
        Self::with_balance(Pence::ZERO)
    }

    /// Create a stub ledger with an initial main-account balance.
    pub fn with_balance(balance: Pence) -> Self {
        Self {
            movements: RwLock::new(Vec::new()),
            balance: RwLock::new(balance),
            fail: RwLock::new(false),
            fail_after: RwLock::new(None),
        }
    }

    /// Make all movements fail.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.write().unwrap() = fail;
    }

    /// Make movements fail once `n` have been applied.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.write().unwrap() = Some(n);
    }

    /// All recorded movements, in order.
    pub fn movements(&self) -> Vec<Movement> {
        self.movements.read().unwrap().clone()
    }

    /// Net delta applied to a pot.
    pub fn pot_total(&self, pot: Pot) -> Pence {
        self.movements
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.pot == pot)
            .fold(Pence::ZERO, |acc, m| acc + m.delta)
    }

    /// Main-account balance after all movements.
    pub fn balance(&self) -> Pence {
        *self.balance.read().unwrap()
    }

    /// Idempotency keys seen, in order.
    pub fn keys(&self) -> Vec<String> {
        self.movements
            .read()
            .unwrap()
            .iter()
            .map(|m| m.key.clone())
            .collect()
    }
}

impl Default for StubLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn move_to_pot(
        &self,
        pot: Pot,
        delta: Pence,
        idempotency_key: &str,
    ) -> Result<(), LedgerError> {
        let applied = self.movements.read().unwrap().len();
        let fail = *self.fail.read().unwrap()
            || self
                .fail_after
                .read()
                .unwrap()
                .is_some_and(|limit| applied >= limit);

        if fail {
            return Err(LedgerError::Movement {
                pot,
                delta,
                message: "simulated ledger failure".to_string(),
            });
        }

        *self.balance.write().unwrap() += -delta;
        self.movements.write().unwrap().push(Movement {
            pot,
            delta,
            key: idempotency_key.to_string(),
        });

        Ok(())
    }
}

// =============================================================================
// Stub Feed
// =============================================================================

/// Stub operational feed for testing.
pub struct StubFeed {
    items: RwLock<Vec<(String, String)>>,
    errors: RwLock<Vec<String>>,
    fail: RwLock<bool>,
}

impl StubFeed {
    /// Create a stub feed.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            errors: RwLock::new(Vec::new()),
            fail: RwLock::new(false),
        }
    }

    /// Make all posts fail.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.write().unwrap() = fail;
    }

    /// Info items posted as (title, body).
    pub fn items(&self) -> Vec<(String, String)> {
        self.items.read().unwrap().clone()
    }

    /// Error messages posted.
    pub fn errors(&self) -> Vec<String> {
        self.errors.read().unwrap().clone()
    }
}

impl Default for StubFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedClient for StubFeed {
    async fn post_info(&self, title: &str, body: &str) -> Result<(), FeedError> {
        if *self.fail.read().unwrap() {
            return Err(FeedError("simulated feed failure".to_string()));
        }
        self.items
            .write()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }

    async fn post_error(&self, message: &str) -> Result<(), FeedError> {
        if *self.fail.read().unwrap() {
            return Err(FeedError("simulated feed failure".to_string()));
        }
        self.errors.write().unwrap().push(message.to_string());
        Ok(())
    }
}

// =============================================================================
// Memory Access Codes
// =============================================================================

/// In-memory access-code store for testing.
pub struct MemoryAccessCodes {
    codes: RwLock<HashMap<String, DestinationAddress>>,
}

impl MemoryAccessCodes {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a code.
    pub fn insert(&self, code: &str, address: DestinationAddress) {
        self.codes.write().unwrap().insert(code.to_string(), address);
    }
}

impl Default for MemoryAccessCodes {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessCodeStore for MemoryAccessCodes {
    async fn resolve(&self, code: &str) -> Result<Option<DestinationAddress>, AccessCodeError> {
        Ok(self.codes.read().unwrap().get(code).copied())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> DestinationAddress {
        DestinationAddress::parse("0x52ec249dd2eec428b1e2f389c7d032caf5d1a238").unwrap()
    }

    #[tokio::test]
    async fn test_stub_exchange_buy_fills_at_price() {
        let exchange = StubExchange::new(100.0);

        let filled = exchange.buy(Pence::new(1000)).await.unwrap();

        assert!((filled - 0.1).abs() < 1e-9);
        assert!((exchange.balance() - 0.1).abs() < 1e-9);
        assert_eq!(exchange.buy_count(), 1);
    }

    #[tokio::test]
    async fn test_stub_exchange_send_tracks_deliveries() {
        let exchange = StubExchange::with_balance(100.0, 1.0);

        exchange.send_asset(0.85, &addr()).await.unwrap();

        assert!((exchange.delivered_to(&addr()) - 0.85).abs() < 1e-9);
        assert!((exchange.balance() - 0.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stub_exchange_fail_buy_after() {
        let exchange = StubExchange::new(100.0);
        exchange.fail_buy_after(2);

        assert!(exchange.buy(Pence::new(1000)).await.is_ok());
        assert!(exchange.buy(Pence::new(1000)).await.is_ok());
        assert!(exchange.buy(Pence::new(1000)).await.is_err());
        assert_eq!(exchange.buy_count(), 2);
    }

    #[tokio::test]
    async fn test_stub_exchange_send_transport_failure() {
        let exchange = StubExchange::with_balance(100.0, 1.0);
        exchange.set_fail_send_transport(true);

        let err = exchange.send_asset(0.85, &addr()).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Transport(_)));
        // Nothing moved
        assert_eq!(exchange.delivered_to(&addr()), 0.0);
        assert!((exchange.balance() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stub_exchange_price_failure() {
        let exchange = StubExchange::new(100.0);
        exchange.set_fail_price(true);

        assert!(exchange.get_price("ETH-GBP").await.is_err());

        exchange.set_fail_price(false);
        assert_eq!(exchange.get_price("ETH-GBP").await.unwrap(), 100.0);
        assert_eq!(exchange.products_queried(), vec!["ETH-GBP".to_string()]);
    }

    #[tokio::test]
    async fn test_stub_ledger_conservation() {
        let ledger = StubLedger::with_balance(Pence::new(1000));

        ledger
            .move_to_pot(Pot::Float, Pence::new(850), "1")
            .await
            .unwrap();
        ledger
            .move_to_pot(Pot::Profit, Pence::new(150), "2")
            .await
            .unwrap();

        assert_eq!(ledger.pot_total(Pot::Float), Pence::new(850));
        assert_eq!(ledger.pot_total(Pot::Profit), Pence::new(150));
        assert_eq!(ledger.balance(), Pence::ZERO);
        assert_eq!(ledger.keys(), vec!["1".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn test_stub_ledger_fail_after() {
        let ledger = StubLedger::new();
        ledger.fail_after(1);

        assert!(ledger
            .move_to_pot(Pot::Float, Pence::new(-1000), "1")
            .await
            .is_ok());
        assert!(ledger
            .move_to_pot(Pot::ExchangeInventory, Pence::new(1000), "2")
            .await
            .is_err());
        assert_eq!(ledger.movements().len(), 1);
    }

    #[tokio::test]
    async fn test_stub_feed_records_posts() {
        let feed = StubFeed::new();

        feed.post_info("REFUND", "details").await.unwrap();
        feed.post_error("boom").await.unwrap();

        assert_eq!(
            feed.items(),
            vec![("REFUND".to_string(), "details".to_string())]
        );
        assert_eq!(feed.errors(), vec!["boom".to_string()]);

        feed.set_fail(true);
        assert!(feed.post_info("x", "y").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_access_codes() {
        let codes = MemoryAccessCodes::new();
        codes.insert("abc123", addr());

        assert_eq!(codes.resolve("abc123").await.unwrap(), Some(addr()));
        assert_eq!(codes.resolve("nope").await.unwrap(), None);
    }
}
