//! Onramp Daemon
//!
//! Runtime orchestrator for the order pipeline and webhook API.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p onrampd
//!
//! # Start with custom environment
//! ONRAMP_ENV=test ONRAMP_API_PORT=8081 cargo run -p onrampd
//! ```
//!
//! # Environment Variables
//!
//! - `ONRAMP_ENV`: Environment (test, development, production)
//! - `ONRAMP_API_HOST`: API host (default: 0.0.0.0)
//! - `ONRAMP_API_PORT`: API port (default: 8080)
//! - `ONRAMP_AMOUNT_EXACT_PENCE`: Accept only this exact amount
//! - `ONRAMP_AMOUNT_MIN_PENCE` / `ONRAMP_AMOUNT_MAX_PENCE`: Accepted
//!   amount range (default: 100..=5000)
//! - `ONRAMP_PRODUCT`: Product pair (default: ETH-GBP)
//! - `ONRAMP_CHUNK_PENCE`: Purchase-loop buy size (default: 1000)
//! - `ONRAMP_STARTING_INVENTORY`: Inventory at startup (default: 0)
//! - `ONRAMP_CALL_TIMEOUT_MS`: External call deadline (default: 10000)
//! - `ONRAMP_ACCESS_CODE_ROOT`: Access-code registry root (default: .)
//! - `ONRAMP_KEY_FILE`: Idempotency key file (default: in-memory counter)
//!
//! Production additionally requires the connector credentials
//! (`ONRAMP_EXCHANGE_*`, `ONRAMP_LEDGER_*`, `ONRAMP_POT_*`).

use onrampd::{Config, Credentials, Daemon, Environment};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("onrampd=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Onramp Daemon"
    );

    // Create and run daemon
    match config.environment {
        Environment::Production => {
            let credentials = Credentials::from_env()?;
            Daemon::new_live(config, credentials)?.run().await?;
        }
        _ => {
            Daemon::new_stub(config).run().await?;
        }
    }

    Ok(())
}
