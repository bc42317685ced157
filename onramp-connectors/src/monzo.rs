//! Monzo ledger REST adapter.
//!
//! Implements the `LedgerClient` and `FeedClient` ports against a
//! Monzo-style API: pot deposits/withdrawals carrying the caller's
//! idempotency key as `dedupe_id`, and feed items for the operational
//! feed. Token acquisition/refresh is out of scope; the client takes a
//! ready access token.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use onramp_domain::{Pence, Pot};
use onramp_exec::{FeedClient, FeedError, LedgerClient, LedgerError};

// =============================================================================
// Constants
// =============================================================================

/// Monzo REST API base URL
const MONZO_API_URL: &str = "https://api.monzo.com";

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Feed item image for informational posts
const INFO_IMAGE_URL: &str =
    "https://cdn0.iconfinder.com/data/icons/elasto-online-store/26/00-STORE-37-512.png";

/// Feed item image for error posts
const ERROR_IMAGE_URL: &str =
    "https://cdn0.iconfinder.com/data/icons/elasto-online-store/26/00-ELASTOFONT-STORE-READY_close-512.png";

// =============================================================================
// Client
// =============================================================================

/// Monzo REST adapter for pot movements and feed items.
pub struct MonzoLedger {
    client: Client,
    base_url: String,
    access_token: String,
    account_id: String,
    /// Pot enum → provider pot id
    pot_ids: HashMap<Pot, String>,
}

impl MonzoLedger {
    /// Create a client with a ready access token and pot-id mapping.
    pub fn new(access_token: String, account_id: String, pot_ids: HashMap<Pot, String>) -> Self {
        Self {
            client: Client::new(),
            base_url: MONZO_API_URL.to_string(),
            access_token,
            account_id,
            pot_ids,
        }
    }

    /// Point the client at a different base URL (for testing).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn pot_id(&self, pot: Pot) -> Result<&str, LedgerError> {
        self.pot_ids
            .get(&pot)
            .map(String::as_str)
            .ok_or_else(|| LedgerError::Movement {
                pot,
                delta: Pence::ZERO,
                message: format!("no pot id configured for {}", pot),
            })
    }

    async fn put_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .form(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
    }
}

// =============================================================================
// LedgerClient
// =============================================================================

#[async_trait]
impl LedgerClient for MonzoLedger {
    async fn move_to_pot(
        &self,
        pot: Pot,
        delta: Pence,
        idempotency_key: &str,
    ) -> Result<(), LedgerError> {
        let pot_id = self.pot_id(pot)?.to_string();
        let amount = delta.as_i64().unsigned_abs().to_string();

        // A negative delta withdraws from the pot back to the account;
        // both directions carry the dedupe key.
        let (path, account_field) = if delta.as_i64() < 0 {
            (format!("/pots/{}/withdraw", pot_id), "destination_account_id")
        } else {
            (format!("/pots/{}/deposit", pot_id), "source_account_id")
        };

        let form = [
            (account_field, self.account_id.as_str()),
            ("amount", amount.as_str()),
            ("dedupe_id", idempotency_key),
        ];

        let response = self.put_form(&path, &form).await.map_err(|e| {
            if e.is_timeout() {
                LedgerError::Timeout(REQUEST_TIMEOUT)
            } else {
                LedgerError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LedgerError::Movement {
                pot,
                delta,
                message: format!("{}: {}", status, detail),
            });
        }

        if delta.as_i64() < 0 {
            info!(pot = %pot, amount = %(-delta), "Withdrew from pot");
        } else {
            info!(pot = %pot, amount = %delta, "Deposited into pot");
        }

        Ok(())
    }
}

// =============================================================================
// FeedClient
// =============================================================================

impl MonzoLedger {
    async fn post_feed_item(
        &self,
        title: &str,
        body: &str,
        image_url: &str,
    ) -> Result<(), FeedError> {
        let form = [
            ("account_id", self.account_id.as_str()),
            ("type", "basic"),
            ("params[title]", title),
            ("params[body]", body),
            ("params[image_url]", image_url),
        ];

        let response = self
            .client
            .post(format!("{}/feed", self.base_url))
            .bearer_auth(&self.access_token)
            .form(&form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| FeedError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FeedError(format!("{}: {}", status, detail)));
        }

        Ok(())
    }
}

#[async_trait]
impl FeedClient for MonzoLedger {
    async fn post_info(&self, title: &str, body: &str) -> Result<(), FeedError> {
        self.post_feed_item(title, body, INFO_IMAGE_URL).await
    }

    async fn post_error(&self, message: &str) -> Result<(), FeedError> {
        self.post_feed_item("ERROR", message, ERROR_IMAGE_URL).await
    }
}

// =============================================================================
// Tests
// =============================================================================
