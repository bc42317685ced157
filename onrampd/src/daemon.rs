//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Order Processor (validate → fulfill → refund)
//! - Connectors (exchange, ledger, feed, access codes)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Wire connectors and the processor
//! 3. Start API server
//! 4. Block until shutdown (SIGINT)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use onramp_connectors::{CoinbaseExchange, MonzoLedger};
use onramp_engine::{FulfillmentEngine, OrderProcessor, OrderValidator, RefundCoordinator};
use onramp_exec::{
    AccessCodeStore, CounterKeys, ExchangeClient, FeedClient, FileBackedKeys, FsAccessCodes,
    IdempotencyKeys, LedgerClient, MemoryAccessCodes, StubExchange, StubFeed, StubLedger,
};

use crate::api::{create_router, ApiState};
use crate::config::{Config, Credentials};
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The main onramp daemon.
pub struct Daemon<X, L, F, R>
where
    X: ExchangeClient + 'static,
    L: LedgerClient + 'static,
    F: FeedClient + 'static,
    R: AccessCodeStore + 'static,
{
    /// Configuration
    config: Config,
    /// Order pipeline
    processor: Arc<OrderProcessor<X, L, F, R>>,
    /// Operational feed (terminal error notices)
    feed: Arc<F>,
}

impl Daemon<StubExchange, StubLedger, StubFeed, MemoryAccessCodes> {
    /// Create a new daemon with stub components (for testing/development).
    pub fn new_stub(config: Config) -> Self {
        let exchange = Arc::new(StubExchange::with_balance(
            100.0,
            config.order.starting_inventory,
        ));
        let ledger = Arc::new(StubLedger::new());
        let feed = Arc::new(StubFeed::new());
        let codes = Arc::new(MemoryAccessCodes::new());
        let keys: Arc<dyn IdempotencyKeys> = Arc::new(CounterKeys::new());

        let processor = Arc::new(OrderProcessor::new(
            OrderValidator::new(config.order.policy, codes),
            FulfillmentEngine::new(
                exchange,
                ledger.clone(),
                keys.clone(),
                config.order.fulfill_config(),
            ),
            RefundCoordinator::new(ledger, feed.clone(), keys),
        ));

        Self {
            config,
            processor,
            feed,
        }
    }
}

impl Daemon<CoinbaseExchange, MonzoLedger, MonzoLedger, FsAccessCodes> {
    /// Create a new daemon wired to the live connectors.
    pub fn new_live(config: Config, credentials: Credentials) -> DaemonResult<Self> {
        let exchange = Arc::new(CoinbaseExchange::new(
            credentials.exchange_key,
            credentials.exchange_secret,
            credentials.exchange_passphrase,
            config.order.product.clone(),
        ));
        let ledger = Arc::new(MonzoLedger::new(
            credentials.ledger_token,
            credentials.ledger_account_id,
            credentials.pot_ids.into_iter().collect(),
        ));
        let codes = Arc::new(FsAccessCodes::new(config.order.access_code_root.clone()));

        let keys: Arc<dyn IdempotencyKeys> = match &config.order.key_file {
            Some(path) => Arc::new(FileBackedKeys::open(path)?),
            None => Arc::new(CounterKeys::new()),
        };

        let processor = Arc::new(OrderProcessor::new(
            OrderValidator::new(config.order.policy, codes),
            FulfillmentEngine::new(
                exchange,
                ledger.clone(),
                keys.clone(),
                config.order.fulfill_config(),
            ),
            RefundCoordinator::new(ledger.clone(), ledger.clone(), keys),
        ));

        Ok(Self {
            config,
            processor,
            feed: ledger,
        })
    }
}

impl<X, L, F, R> Daemon<X, L, F, R>
where
    X: ExchangeClient + 'static,
    L: LedgerClient + 'static,
    F: FeedClient + 'static,
    R: AccessCodeStore + 'static,
{
    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting onramp daemon"
        );

        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // Block here; the server task carries the traffic.
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to listen for shutdown: {}", e)))?;

        info!("Received shutdown signal");
        Ok(())
    }

    /// Start the API server.
    async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            processor: self.processor.clone(),
            feed: self.feed.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Config(format!("Failed to get local address: {}", e)))?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}

// =============================================================================
// Tests
// =============================================================================
