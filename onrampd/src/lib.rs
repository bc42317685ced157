//! Onramp Daemon Library
//!
//! Runtime orchestrator for the onramp order pipeline.
//!
//! # Architecture
//!
//! ```text
//! Webhook → API Server → Order Processor → Fulfillment Engine → Exchange
//!                              ↓                    ↓
//!                       Refund Coordinator        Ledger
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **API**: HTTP endpoints (health check, webhook)
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use onrampd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;

// Re-exports for convenience
pub use config::{ApiConfig, Config, Credentials, Environment, OrderConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
