//! Coinbase exchange REST adapter.
//!
//! Implements the `ExchangeClient` port against a Coinbase
//! Exchange-style REST API:
//! - Best ask from the level-1 order book for price
//! - Market order with fixed fiat `funds` for the purchase chunk
//! - Crypto withdrawal for delivery
//!
//! # Authentication
//!
//! Signed requests carry:
//! - `CB-ACCESS-KEY` / `CB-ACCESS-PASSPHRASE` headers
//! - `CB-ACCESS-TIMESTAMP` (unix seconds)
//! - `CB-ACCESS-SIGN`: base64(HMAC-SHA256(base64-decoded secret,
//!   timestamp + method + path + body))

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use onramp_domain::{DestinationAddress, Pence};
use onramp_exec::{ExchangeClient, ExchangeError};

// =============================================================================
// Constants
// =============================================================================

/// Coinbase Exchange REST API base URL
const COINBASE_API_URL: &str = "https://api.exchange.coinbase.com";

/// Sandbox base URL (for testing)
const COINBASE_SANDBOX_URL: &str = "https://api-public.sandbox.exchange.coinbase.com";

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Wire types
// =============================================================================

/// Level-1 order book: rows are [price, size, num-orders].
#[derive(Debug, Deserialize)]
struct BookResponse {
    asks: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct MarketOrderRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    side: &'a str,
    product_id: &'a str,
    funds: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    filled_size: Option<String>,
}

#[derive(Debug, Serialize)]
struct WithdrawCryptoRequest {
    amount: String,
    currency: String,
    crypto_address: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawCryptoResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// =============================================================================
// Client
// =============================================================================

/// Coinbase REST adapter for price, fixed-size buys, and transfer-out.
pub struct CoinbaseExchange {
    client: Client,
    api_key: String,
    api_secret: String,
    passphrase: String,
    /// Product bought and quoted (e.g. `ETH-GBP`)
    product: String,
    /// Asset currency withdrawn (the product's base, e.g. `ETH`)
    asset: String,
    sandbox: bool,
}

impl CoinbaseExchange {
    /// Create a live client for a product pair like `ETH-GBP`.
    pub fn new(api_key: String, api_secret: String, passphrase: String, product: String) -> Self {
        let asset = product
            .split('-')
            .next()
            .unwrap_or(product.as_str())
            .to_string();
        Self {
            client: Client::new(),
            api_key,
            api_secret,
            passphrase,
            product,
            asset,
            sandbox: false,
        }
    }

    /// Create a client against the public sandbox (for testing).
    pub fn sandbox(
        api_key: String,
        api_secret: String,
        passphrase: String,
        product: String,
    ) -> Self {
        let mut client = Self::new(api_key, api_secret, passphrase, product);
        client.sandbox = true;
        client
    }

    fn base_url(&self) -> &str {
        if self.sandbox {
            COINBASE_SANDBOX_URL
        } else {
            COINBASE_API_URL
        }
    }

    /// Compute the CB-ACCESS-SIGN value for a request.
    fn sign(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<String, ExchangeError> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        type HmacSha256 = Hmac<Sha256>;

        let secret = base64::engine::general_purpose::STANDARD
            .decode(&self.api_secret)
            .map_err(|e| ExchangeError::Api(format!("invalid API secret: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| ExchangeError::Api(format!("failed to build signature: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(body.as_bytes());

        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Send a signed request and decode the JSON response.
    async fn signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T, ExchangeError> {
        let body = body.unwrap_or_default();
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&timestamp, method.as_str(), path, &body)?;

        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url(), path))
            .header("CB-ACCESS-KEY", &self.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp)
            .header("CB-ACCESS-PASSPHRASE", &self.passphrase)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT);

        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(map_transport)?;
        decode_response(response).await
    }

    /// Unauthenticated GET (public market data).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<T, ExchangeError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(map_transport)?;
        decode_response(response).await
    }
}

fn map_transport(e: reqwest::Error) -> ExchangeError {
    if e.is_timeout() {
        ExchangeError::Timeout(REQUEST_TIMEOUT)
    } else {
        ExchangeError::Transport(e.to_string())
    }
}

async fn decode_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ExchangeError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_else(|_| status.to_string());
        return Err(ExchangeError::Api(format!("{}: {}", status, message)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ExchangeError::Api(format!("failed to parse response: {}", e)))
}

fn parse_f64(s: &str, what: &str) -> Result<f64, ExchangeError> {
    s.parse::<f64>()
        .map_err(|e| ExchangeError::Api(format!("unparseable {}: {} ({})", what, s, e)))
}

// =============================================================================
// ExchangeClient
// =============================================================================

#[async_trait]
impl ExchangeClient for CoinbaseExchange {
    async fn get_price(&self, product: &str) -> Result<f64, ExchangeError> {
        let book: BookResponse = self
            .public_get(&format!("/products/{}/book?level=1", product))
            .await?;

        let ask = book
            .asks
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExchangeError::Api(format!("empty order book for {}", product)))?;

        parse_f64(ask, "ask price")
    }

    async fn buy(&self, fiat: Pence) -> Result<f64, ExchangeError> {
        info!(fiat = %fiat, product = %self.product, "Placing market buy");

        let order = MarketOrderRequest {
            kind: "market",
            side: "buy",
            product_id: &self.product,
            funds: format!("{:.2}", fiat.as_major_units()),
        };
        let body = serde_json::to_string(&order)
            .map_err(|e| ExchangeError::Api(format!("failed to encode order: {}", e)))?;

        let placed: OrderResponse = self
            .signed_request(reqwest::Method::POST, "/orders", Some(body))
            .await?;

        // Market orders fill immediately; fetch the executed size.
        let executed: OrderResponse = self
            .signed_request(
                reqwest::Method::GET,
                &format!("/orders/{}", placed.id),
                None,
            )
            .await?;

        let filled = executed
            .filled_size
            .ok_or_else(|| ExchangeError::Api(format!("order {} has no filled size", placed.id)))?;

        debug!(order_id = %placed.id, filled = %filled, "Buy filled");
        parse_f64(&filled, "filled size")
    }

    async fn send_asset(
        &self,
        amount: f64,
        to: &DestinationAddress,
    ) -> Result<(), ExchangeError> {
        info!(amount, to = %to, asset = %self.asset, "Withdrawing asset");

        let withdrawal = WithdrawCryptoRequest {
            amount: format!("{}", amount),
            currency: self.asset.clone(),
            crypto_address: to.to_hex(),
        };
        let body = serde_json::to_string(&withdrawal)
            .map_err(|e| ExchangeError::Api(format!("failed to encode withdrawal: {}", e)))?;

        let result: WithdrawCryptoResponse = self
            .signed_request(reqwest::Method::POST, "/withdrawals/crypto", Some(body))
            .await?;

        debug!(withdrawal_id = %result.id, "Withdrawal accepted");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CoinbaseExchange {
        CoinbaseExchange::new(
            "key".to_string(),
            base64::engine::general_purpose::STANDARD.encode("secret"),
            "pass".to_string(),
            "ETH-GBP".to_string(),
        )
    }

    #[test]
    fn test_asset_derived_from_product() {
        assert_eq!(client().asset, "ETH");
        let btc = CoinbaseExchange::new(
            String::new(),
            String::new(),
            String::new(),
            "BTC-GBP".to_string(),
        );
        assert_eq!(btc.asset, "BTC");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let c = client();

        let a = c.sign("1700000000", "POST", "/orders", "{}").unwrap();
        let b = c.sign("1700000000", "POST", "/orders", "{}").unwrap();
        let other = c.sign("1700000001", "POST", "/orders", "{}").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn test_signature_rejects_unencoded_secret() {
        let c = CoinbaseExchange::new(
            "key".to_string(),
            "not valid base64!!!".to_string(),
            "pass".to_string(),
            "ETH-GBP".to_string(),
        );

        assert!(c.sign("1700000000", "GET", "/orders", "").is_err());
    }

    #[test]
    fn test_book_response_parses_level_one() {
        let raw = r#"{"bids":[["99.5","2.1",3]],"asks":[["100.25","1.5",2]],"sequence":42}"#;
        let book: BookResponse = serde_json::from_str(raw).unwrap();

        let ask = book.asks[0][0].as_str().unwrap();
        assert_eq!(parse_f64(ask, "ask").unwrap(), 100.25);
    }

    #[test]
    fn test_funds_formatted_as_decimal_currency() {
        let order = MarketOrderRequest {
            kind: "market",
            side: "buy",
            product_id: "ETH-GBP",
            funds: format!("{:.2}", Pence::new(1000).as_major_units()),
        };

        assert_eq!(order.funds, "10.00");
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains(r#""type":"market""#));
        assert!(json.contains(r#""funds":"10.00""#));
    }
}
