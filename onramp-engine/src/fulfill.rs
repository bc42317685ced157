//! Fulfillment engine: the inventory-backed purchase-and-delivery loop.
//!
//! # Flow
//!
//! ```text
//! Order → price → (buy chunk → book float/inventory)* → deliver → book net/profit
//! ```
//!
//! The engine owns the only mutable state in the system: the balance of
//! purchased-but-undelivered asset. The whole span of `fulfill` (price
//! read through the final ledger write) runs under one lock, because
//! the inventory-sufficiency check is unsafe under concurrent execution
//! otherwise.
//!
//! Steps are deliberately NOT transactional: ledger and inventory
//! changes applied before a failing step stay applied, and the
//! post-delivery book credits are posted regardless of the delivery
//! outcome. Drift is logged for manual reconciliation, never rolled
//! back here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use onramp_domain::{Order, Pence, Pot};
use onramp_exec::{ExchangeClient, ExchangeError, IdempotencyKeys, LedgerClient, LedgerError};

use crate::error::FulfillError;

/// Retained fraction of every order, truncated to integer pence.
pub const COMMISSION_RATE: f64 = 0.15;

// =============================================================================
// Configuration
// =============================================================================

/// Fulfillment engine configuration.
#[derive(Debug, Clone)]
pub struct FulfillConfig {
    /// Product pair quoted and bought (e.g. `ETH-GBP`)
    pub product: String,
    /// Fixed fiat size of every purchase-loop buy, system-wide
    pub chunk: Pence,
    /// Deadline applied to every external call
    pub call_timeout: Duration,
    /// Inventory balance at process start. Not recovered from the
    /// exchange: a restart forgets any balance actually held there.
    pub starting_inventory: f64,
}

impl Default for FulfillConfig {
    fn default() -> Self {
        Self {
            product: "ETH-GBP".to_string(),
            chunk: Pence::new(1000),
            call_timeout: Duration::from_secs(10),
            starting_inventory: 0.0,
        }
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// What a successful fulfillment did.
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillReceipt {
    /// Order correlation id
    pub order_id: uuid::Uuid,
    /// Asset delivered to the customer
    pub delivered: f64,
    /// Commission retained, in pence
    pub commission: Pence,
    /// Amount converted for the customer, in pence
    pub net: Pence,
    /// Purchase-loop iterations executed
    pub purchases: u32,
}

// =============================================================================
// Engine
// =============================================================================

/// Inventory-backed purchase-and-delivery engine.
///
/// Holds the process-lifetime inventory balance behind a mutex; every
/// `fulfill` call serializes on it.
pub struct FulfillmentEngine<X: ExchangeClient, L: LedgerClient> {
    exchange: Arc<X>,
    ledger: Arc<L>,
    keys: Arc<dyn IdempotencyKeys>,
    config: FulfillConfig,
    /// Purchased-but-undelivered asset. Mutated only by the purchase
    /// loop (up) and the delivery step (down).
    inventory: Mutex<f64>,
}

impl<X: ExchangeClient, L: LedgerClient> FulfillmentEngine<X, L> {
    /// Create an engine with the configured starting inventory.
    pub fn new(
        exchange: Arc<X>,
        ledger: Arc<L>,
        keys: Arc<dyn IdempotencyKeys>,
        config: FulfillConfig,
    ) -> Self {
        let inventory = Mutex::new(config.starting_inventory);
        Self {
            exchange,
            ledger,
            keys,
            config,
            inventory,
        }
    }

    /// Current inventory balance (test/diagnostic read).
    pub async fn inventory(&self) -> f64 {
        *self.inventory.lock().await
    }

    /// Fulfill a validated order.
    ///
    /// On failure the caller is expected to attempt a refund of the
    /// original order amount; that refund does not reconcile any
    /// internal drift this call may have left behind.
    pub async fn fulfill(&self, order: &Order) -> Result<FulfillReceipt, FulfillError> {
        // Single critical section: price read through final ledger
        // write. Concurrent webhook deliveries queue here.
        let mut inventory = self.inventory.lock().await;

        let price = self
            .exchange_call(self.exchange.get_price(&self.config.product))
            .await
            .map_err(FulfillError::PriceQuery)?;

        let commission = Pence::new((order.amount.as_i64() as f64 * COMMISSION_RATE) as i64);
        let net = order.amount - commission;
        let target = net.as_major_units() / price;

        info!(
            order = %order.id,
            amount = %order.amount,
            commission = %commission,
            net = %net,
            price,
            target,
            inventory = *inventory,
            "Fulfilling order"
        );

        // Top up inventory with fixed-size chunks until the order can
        // be covered. Each filled chunk is booked immediately, so a
        // later failure leaves these movements applied.
        let mut purchases = 0u32;
        while target > *inventory {
            debug!(inventory = *inventory, target, chunk = %self.config.chunk, "Buying chunk");

            let filled = self
                .exchange_call(self.exchange.buy(self.config.chunk))
                .await
                .map_err(|source| {
                    if purchases > 0 {
                        warn!(
                            order = %order.id,
                            completed_chunks = purchases,
                            "Purchase loop aborted; movements from filled chunks remain applied"
                        );
                    }
                    FulfillError::Purchase {
                        source,
                        completed_chunks: purchases,
                    }
                })?;

            *inventory += filled;
            purchases += 1;

            self.move_to_pot(Pot::Float, -self.config.chunk).await?;
            self.move_to_pot(Pot::ExchangeInventory, self.config.chunk)
                .await?;
        }

        debug!(inventory = *inventory, target, "Inventory sufficient, delivering");

        // The delivery result is captured, not checked yet: inventory
        // and the post-delivery book credits apply regardless of the
        // outcome (legacy reconciliation model; see module docs).
        let delivery = self
            .exchange_call(self.exchange.send_asset(target, &order.destination))
            .await;

        *inventory -= target;

        // Log the failure before the book credits: a credit failure
        // below aborts the call, and the delivery outcome must reach
        // the logs either way.
        if let Err(source) = &delivery {
            error!(
                order = %order.id,
                destination = %order.destination,
                target,
                outcome_unknown = delivery_outcome_unknown(source),
                error = %source,
                "Delivery failed; books are still credited and now carry \
                 unreconciled drift"
            );
        }

        self.move_to_pot(Pot::Float, net).await?;
        self.move_to_pot(Pot::Profit, commission).await?;

        if let Err(source) = delivery {
            let outcome_unknown = delivery_outcome_unknown(&source);
            return Err(FulfillError::Delivery {
                source,
                outcome_unknown,
            });
        }

        info!(
            order = %order.id,
            delivered = target,
            purchases,
            inventory = *inventory,
            "Order fulfilled"
        );

        Ok(FulfillReceipt {
            order_id: order.id,
            delivered: target,
            commission,
            net,
            purchases,
        })
    }

    /// Apply a pot movement with a fresh idempotency key.
    async fn move_to_pot(&self, pot: Pot, delta: Pence) -> Result<(), LedgerError> {
        let key = self.keys.next_key();
        match timeout(
            self.config.call_timeout,
            self.ledger.move_to_pot(pot, delta, &key),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.config.call_timeout)),
        }
    }

    /// Bound an exchange call to the configured deadline.
    async fn exchange_call<T>(
        &self,
        fut: impl Future<Output = Result<T, ExchangeError>>,
    ) -> Result<T, ExchangeError> {
        match timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(self.config.call_timeout)),
        }
    }
}

/// A timeout or transport failure means the asset may have been sent
/// anyway; an explicit API rejection means it was not.
fn delivery_outcome_unknown(error: &ExchangeError) -> bool {
    matches!(
        error,
        ExchangeError::Timeout(_) | ExchangeError::Transport(_)
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use onramp_domain::DestinationAddress;
    use onramp_exec::{CounterKeys, StubExchange, StubLedger};
    use uuid::Uuid;

    const TOLERANCE: f64 = 1e-5;

    fn order(amount: i64) -> Order {
        Order {
            id: Uuid::now_v7(),
            sort_code: "123456".to_string(),
            account_number: "12345678".to_string(),
            currency: "GBP".to_string(),
            amount: Pence::new(amount),
            destination: DestinationAddress::parse(
                "0x52ec249dd2eec428b1e2f389c7d032caf5d1a238",
            )
            .unwrap(),
        }
    }

    fn engine(
        exchange: Arc<StubExchange>,
        ledger: Arc<StubLedger>,
        starting_inventory: f64,
    ) -> FulfillmentEngine<StubExchange, StubLedger> {
        FulfillmentEngine::new(
            exchange,
            ledger,
            Arc::new(CounterKeys::starting_at(0)),
            FulfillConfig {
                starting_inventory,
                ..FulfillConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_commission_truncates_toward_zero() {
        // 15% of 999 is 149.85; commission truncates to 149.
        let exchange = Arc::new(StubExchange::new(100.0));
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange, ledger, 1.0);

        let receipt = subject.fulfill(&order(999)).await.unwrap();

        assert_eq!(receipt.commission, Pence::new(149));
        assert_eq!(receipt.net, Pence::new(850));
    }

    #[tokio::test]
    async fn test_minimal_purchase_iterations() {
        // target 0.85, chunk fills 0.1: exactly 9 buys reach 0.9 >= 0.85.
        let exchange = Arc::new(StubExchange::new(100.0));
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange.clone(), ledger, 0.0);

        let receipt = subject.fulfill(&order(10000)).await.unwrap();

        assert_eq!(receipt.purchases, 9);
        assert_eq!(exchange.buy_count(), 9);
        assert!(subject.inventory().await >= 0.0);
        assert!((subject.inventory().await - 0.05).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_price_failure_aborts_before_any_movement() {
        let exchange = Arc::new(StubExchange::new(100.0));
        exchange.set_fail_price(true);
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange.clone(), ledger.clone(), 0.0);

        let err = subject.fulfill(&order(1000)).await.unwrap_err();

        assert!(matches!(err, FulfillError::PriceQuery(_)));
        assert!(ledger.movements().is_empty());
        assert_eq!(exchange.buy_count(), 0);
        assert_eq!(subject.inventory().await, 0.0);
    }

    #[tokio::test]
    async fn test_purchase_failure_keeps_prior_movements() {
        // Nine chunks needed, third buy fails: the first two stay booked.
        let exchange = Arc::new(StubExchange::new(100.0));
        exchange.fail_buy_after(2);
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange, ledger.clone(), 0.0);

        let err = subject.fulfill(&order(10000)).await.unwrap_err();

        match err {
            FulfillError::Purchase {
                completed_chunks, ..
            } => assert_eq!(completed_chunks, 2),
            other => panic!("Expected Purchase, got {:?}", other),
        }
        assert_eq!(ledger.pot_total(Pot::Float), Pence::new(-2000));
        assert_eq!(ledger.pot_total(Pot::ExchangeInventory), Pence::new(2000));
        assert!((subject.inventory().await - 0.2).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_credits_books() {
        let exchange = Arc::new(StubExchange::new(100.0));
        exchange.set_fail_send(true);
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange, ledger.clone(), 1.0);

        let err = subject.fulfill(&order(10000)).await.unwrap_err();

        match err {
            FulfillError::Delivery { outcome_unknown, .. } => {
                // An explicit API rejection is a known failure
                assert!(!outcome_unknown);
            }
            other => panic!("Expected Delivery, got {:?}", other),
        }
        // Books credited despite the failed delivery (legacy behavior,
        // reconciled manually).
        assert_eq!(ledger.pot_total(Pot::Float), Pence::new(8500));
        assert_eq!(ledger.pot_total(Pot::Profit), Pence::new(1500));
        assert!((subject.inventory().await - 0.15).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_delivery_transport_failure_flags_unknown_outcome() {
        let exchange = Arc::new(StubExchange::new(100.0));
        exchange.set_fail_send_transport(true);
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange, ledger.clone(), 1.0);

        let err = subject.fulfill(&order(10000)).await.unwrap_err();

        match err {
            FulfillError::Delivery { outcome_unknown, .. } => {
                // The transfer may have left the exchange anyway
                assert!(outcome_unknown);
            }
            other => panic!("Expected Delivery, got {:?}", other),
        }
        // Credits and inventory decrement apply exactly as for a
        // rejected delivery.
        assert_eq!(ledger.pot_total(Pot::Float), Pence::new(8500));
        assert_eq!(ledger.pot_total(Pot::Profit), Pence::new(1500));
        assert!((subject.inventory().await - 0.15).abs() < TOLERANCE);
    }

    #[test]
    fn test_delivery_timeout_flags_unknown_outcome() {
        assert!(delivery_outcome_unknown(&ExchangeError::Timeout(
            Duration::from_secs(10)
        )));
        assert!(delivery_outcome_unknown(&ExchangeError::Transport(
            "connection reset".to_string()
        )));
        assert!(!delivery_outcome_unknown(&ExchangeError::Api(
            "rejected".to_string()
        )));
    }

    #[tokio::test]
    async fn test_credit_failure_after_failed_delivery_aborts_on_ledger() {
        // Delivery fails, then the first post-delivery credit fails.
        // The ledger error aborts the call; the inventory decrement
        // from the captured delivery result stays applied.
        let exchange = Arc::new(StubExchange::new(100.0));
        exchange.set_fail_send(true);
        let ledger = Arc::new(StubLedger::new());
        ledger.set_fail(true);
        let subject = engine(exchange, ledger.clone(), 1.0);

        let err = subject.fulfill(&order(10000)).await.unwrap_err();

        assert!(matches!(err, FulfillError::Ledger(_)));
        assert!(ledger.movements().is_empty());
        assert!((subject.inventory().await - 0.15).abs() < TOLERANCE);
    }

    #[tokio::test]
    async fn test_ledger_failure_mid_loop_aborts() {
        // First movement (float withdrawal) lands, second fails.
        let exchange = Arc::new(StubExchange::new(100.0));
        let ledger = Arc::new(StubLedger::new());
        ledger.fail_after(1);
        let subject = engine(exchange, ledger.clone(), 0.0);

        let err = subject.fulfill(&order(1000)).await.unwrap_err();

        assert!(matches!(err, FulfillError::Ledger(_)));
        assert_eq!(ledger.movements().len(), 1);
        assert_eq!(ledger.pot_total(Pot::Float), Pence::new(-1000));
    }

    #[tokio::test]
    async fn test_idempotency_keys_strictly_increasing_across_orders() {
        let exchange = Arc::new(StubExchange::new(100.0));
        let ledger = Arc::new(StubLedger::new());
        let subject = engine(exchange, ledger.clone(), 0.0);

        subject.fulfill(&order(1000)).await.unwrap();
        subject.fulfill(&order(1000)).await.unwrap();

        let keys: Vec<i64> = ledger
            .keys()
            .iter()
            .map(|k| k.parse::<i64>().unwrap())
            .collect();
        assert!(!keys.is_empty());
        for pair in keys.windows(2) {
            assert!(pair[1] > pair[0], "keys must be strictly increasing");
        }
    }

    #[tokio::test]
    async fn test_concurrent_fulfillments_serialize_on_inventory() {
        // Two orders racing for the same starting inventory must not
        // both satisfy themselves from it.
        let exchange = Arc::new(StubExchange::new(100.0));
        let ledger = Arc::new(StubLedger::new());
        let subject = Arc::new(engine(exchange.clone(), ledger, 1.0));

        let a = {
            let subject = subject.clone();
            tokio::spawn(async move { subject.fulfill(&order(10000)).await })
        };
        let b = {
            let subject = subject.clone();
            tokio::spawn(async move { subject.fulfill(&order(10000)).await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Each order targets 0.85. Whichever runs first consumes the
        // starting 1.0 without buying; the other must top up from 0.15
        // (8 chunks, the f64 sum of 0.1s lands a hair under 0.85 at 7).
        assert_eq!(exchange.buy_count(), 8);
        assert!(subject.inventory().await >= 0.0);
        assert!((subject.inventory().await - 0.1).abs() < TOLERANCE);
    }
}
