//! HTTP API for the onramp daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Webhook delivery (one transaction notification per request)
//!
//! The webhook endpoint answers 200 for every handled notification,
//! including ones that ended in a refund: the provider re-delivers on
//! non-2xx, and re-delivering a failed order would double-process it.
//! Terminal errors are logged and forwarded to the operational feed
//! instead.

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use onramp_engine::{OrderError, OrderProcessor, Outcome};
use onramp_exec::{AccessCodeStore, ExchangeClient, FeedClient, LedgerClient};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<X, L, F, R>
where
    X: ExchangeClient + 'static,
    L: LedgerClient + 'static,
    F: FeedClient + 'static,
    R: AccessCodeStore + 'static,
{
    pub processor: Arc<OrderProcessor<X, L, F, R>>,
    pub feed: Arc<F>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<X, L, F, R>(state: Arc<ApiState<X, L, F, R>>) -> Router
where
    X: ExchangeClient + 'static,
    L: LedgerClient + 'static,
    F: FeedClient + 'static,
    R: AccessCodeStore + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Webhook endpoint: one transaction notification per delivery.
async fn webhook_handler<X, L, F, R>(
    State(state): State<Arc<ApiState<X, L, F, R>>>,
    body: Bytes,
) -> Json<WebhookResponse>
where
    X: ExchangeClient + 'static,
    L: LedgerClient + 'static,
    F: FeedClient + 'static,
    R: AccessCodeStore + 'static,
{
    match state.processor.process(&body).await {
        Ok(Outcome::Fulfilled(receipt)) => {
            info!(
                order_id = %receipt.order_id,
                delivered = receipt.delivered,
                commission = %receipt.commission,
                purchases = receipt.purchases,
                "Order fulfilled"
            );
            Json(WebhookResponse {
                status: "fulfilled".to_string(),
                order_id: Some(receipt.order_id),
                detail: None,
            })
        }

        Ok(Outcome::Ignored) => Json(WebhookResponse {
            status: "ignored".to_string(),
            order_id: None,
            detail: None,
        }),

        Err(terminal) => {
            let status = match &terminal {
                OrderError::Refunded { .. } => "refunded",
                OrderError::Unrecoverable { .. } => "unrecoverable",
                OrderError::RefundFailed { .. } => "refund-failed",
            };
            error!(error = %terminal, status, "Order failed");

            if let Err(e) = state.feed.post_error(&terminal.to_string()).await {
                warn!(error = %e, "Failed to post error to feed");
            }

            Json(WebhookResponse {
                status: status.to_string(),
                order_id: None,
                detail: Some(terminal.to_string()),
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
