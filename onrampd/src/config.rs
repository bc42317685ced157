//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use onramp_domain::{AmountPolicy, Pence, Pot};
use onramp_engine::FulfillConfig;

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Order pipeline configuration
    pub order: OrderConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Order pipeline configuration.
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Accepted order amounts
    pub policy: AmountPolicy,
    /// Product pair quoted and bought
    pub product: String,
    /// Fiat size of every purchase-loop buy
    pub chunk: Pence,
    /// Inventory balance assumed at startup
    pub starting_inventory: f64,
    /// Deadline applied to every external call
    pub call_timeout: Duration,
    /// Root directory of the access-code registry
    pub access_code_root: PathBuf,
    /// Idempotency key file; a plain counter is used when unset
    pub key_file: Option<PathBuf>,
}

/// Live connector credentials, loaded separately from `Config` so the
/// stub wiring never requires them.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Exchange API key
    pub exchange_key: String,
    /// Exchange API secret (base64)
    pub exchange_secret: String,
    /// Exchange API passphrase
    pub exchange_passphrase: String,
    /// Ledger bearer token
    pub ledger_token: String,
    /// Ledger account id
    pub ledger_account_id: String,
    /// Provider pot ids, one per pot
    pub pot_ids: Vec<(Pot, String)>,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let order = Self::load_order_config()?;

        Ok(Self {
            api,
            order,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            order: OrderConfig::default(),
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("ONRAMP_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid ONRAMP_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("ONRAMP_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_str = env::var("ONRAMP_API_PORT").unwrap_or_else(|_| "8080".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| DaemonError::Config(format!("Invalid ONRAMP_API_PORT: {}", port_str)))?;

        Ok(ApiConfig { host, port })
    }

    fn load_order_config() -> DaemonResult<OrderConfig> {
        let policy = Self::load_amount_policy()?;

        let product = env::var("ONRAMP_PRODUCT").unwrap_or_else(|_| "ETH-GBP".to_string());
        let chunk = Pence::new(Self::load_i64_env("ONRAMP_CHUNK_PENCE", 1000)?);
        if !chunk.is_positive() {
            return Err(DaemonError::Config(format!(
                "ONRAMP_CHUNK_PENCE must be positive, got {}",
                chunk
            )));
        }

        let starting_inventory = match env::var("ONRAMP_STARTING_INVENTORY") {
            Ok(val) => val.parse::<f64>().map_err(|_| {
                DaemonError::Config(format!("Invalid ONRAMP_STARTING_INVENTORY: {}", val))
            })?,
            Err(_) => 0.0,
        };

        let timeout_ms = Self::load_i64_env("ONRAMP_CALL_TIMEOUT_MS", 10_000)?;
        if timeout_ms <= 0 {
            return Err(DaemonError::Config(format!(
                "ONRAMP_CALL_TIMEOUT_MS must be positive, got {}",
                timeout_ms
            )));
        }
        let call_timeout = Duration::from_millis(timeout_ms as u64);

        let access_code_root = env::var("ONRAMP_ACCESS_CODE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let key_file = env::var("ONRAMP_KEY_FILE").map(PathBuf::from).ok();

        Ok(OrderConfig {
            policy,
            product,
            chunk,
            starting_inventory,
            call_timeout,
            access_code_root,
            key_file,
        })
    }

    /// An exact amount takes precedence over a range; with neither set,
    /// the default range applies.
    fn load_amount_policy() -> DaemonResult<AmountPolicy> {
        if let Ok(val) = env::var("ONRAMP_AMOUNT_EXACT_PENCE") {
            let exact = val.parse::<i64>().map_err(|_| {
                DaemonError::Config(format!("Invalid ONRAMP_AMOUNT_EXACT_PENCE: {}", val))
            })?;
            return Ok(AmountPolicy::Exact(Pence::new(exact)));
        }

        let min = Pence::new(Self::load_i64_env("ONRAMP_AMOUNT_MIN_PENCE", 100)?);
        let max = Pence::new(Self::load_i64_env("ONRAMP_AMOUNT_MAX_PENCE", 5000)?);

        AmountPolicy::range(min, max).map_err(|e| {
            DaemonError::Config(format!("Invalid amount range {}..={}: {}", min, max, e))
        })
    }

    fn load_i64_env(key: &str, default: i64) -> DaemonResult<i64> {
        match env::var(key) {
            Ok(val) => val
                .parse::<i64>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            order: OrderConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            policy: AmountPolicy::Range {
                min: Pence::new(100),
                max: Pence::new(5000),
            },
            product: "ETH-GBP".to_string(),
            chunk: Pence::new(1000),
            starting_inventory: 0.0,
            call_timeout: Duration::from_secs(10),
            access_code_root: PathBuf::from("."),
            key_file: None,
        }
    }
}

impl OrderConfig {
    /// The engine view of this configuration.
    pub fn fulfill_config(&self) -> FulfillConfig {
        FulfillConfig {
            product: self.product.clone(),
            chunk: self.chunk,
            call_timeout: self.call_timeout,
            starting_inventory: self.starting_inventory,
        }
    }
}

impl Credentials {
    /// Load live connector credentials from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        let pot_ids = Pot::ALL
            .iter()
            .map(|pot| {
                let key = format!(
                    "ONRAMP_POT_{}",
                    pot.name().to_uppercase().replace('-', "_")
                );
                Ok((*pot, Self::require(&key)?))
            })
            .collect::<DaemonResult<Vec<_>>>()?;

        Ok(Self {
            exchange_key: Self::require("ONRAMP_EXCHANGE_KEY")?,
            exchange_secret: Self::require("ONRAMP_EXCHANGE_SECRET")?,
            exchange_passphrase: Self::require("ONRAMP_EXCHANGE_PASSPHRASE")?,
            ledger_token: Self::require("ONRAMP_LEDGER_TOKEN")?,
            ledger_account_id: Self::require("ONRAMP_LEDGER_ACCOUNT_ID")?,
            pot_ids,
        })
    }

    fn require(key: &str) -> DaemonResult<String> {
        env::var(key).map_err(|_| DaemonError::Config(format!("{} is required", key)))
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
