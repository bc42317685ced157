//! Refund coordinator: best-effort money-back path.
//!
//! Invoked whenever validation or fulfillment fails. Posts a
//! human-readable notice to the operational feed (best-effort), then
//! deposits the full original amount into the refund pot. The
//! triggering failure is always reported upward, refund or not.

use std::sync::Arc;

use tracing::{error, info, warn};

use onramp_domain::{OrderDraft, Pot};
use onramp_exec::{FeedClient, IdempotencyKeys, LedgerClient};

use crate::error::{OrderError, OrderFailure};

/// Best-effort refund path for failed orders.
pub struct RefundCoordinator<L: LedgerClient, F: FeedClient> {
    ledger: Arc<L>,
    feed: Arc<F>,
    keys: Arc<dyn IdempotencyKeys>,
}

impl<L: LedgerClient, F: FeedClient> RefundCoordinator<L, F> {
    /// Create a coordinator.
    pub fn new(ledger: Arc<L>, feed: Arc<F>, keys: Arc<dyn IdempotencyKeys>) -> Self {
        Self { ledger, feed, keys }
    }

    /// Attempt to return the customer's money.
    ///
    /// Always yields a terminal error: `Refunded` still carries the
    /// original cause so it reaches logs and alerts.
    pub async fn refund(&self, draft: &OrderDraft, cause: OrderFailure) -> OrderError {
        // Validation can fail before counterparty fields are populated;
        // without them there is nowhere to send the money back.
        if !draft.has_refund_identity() {
            error!(draft = %draft, cause = %cause, "Cannot refund: counterparty identity incomplete");
            return OrderError::Unrecoverable { cause };
        }

        let notice = format!(
            "{} {} {} {} {}",
            draft.sort_code, draft.account_number, draft.amount, draft.currency, cause
        );
        if let Err(e) = self.feed.post_info("REFUND", &notice).await {
            // Best-effort: the deposit matters, the notice does not.
            warn!(error = %e, "Failed to post refund notice to feed");
        }

        match self
            .ledger
            .move_to_pot(Pot::Refund, draft.amount, &self.keys.next_key())
            .await
        {
            Ok(()) => {
                info!(draft = %draft, amount = %draft.amount, "Refund deposited");
                OrderError::Refunded { cause }
            }
            Err(deposit) => {
                error!(draft = %draft, error = %deposit, "Refund deposit failed");
                OrderError::RefundFailed { deposit, cause }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use onramp_domain::Pence;
    use onramp_exec::{CounterKeys, StubFeed, StubLedger};

    fn draft() -> OrderDraft {
        OrderDraft {
            sort_code: "123456".to_string(),
            account_number: "12345678".to_string(),
            currency: "GBP".to_string(),
            amount: Pence::new(1200),
        }
    }

    fn cause() -> OrderFailure {
        OrderFailure::Validation(ValidationError::WrongCurrency("EUR".to_string()))
    }

    fn coordinator(
        ledger: Arc<StubLedger>,
        feed: Arc<StubFeed>,
    ) -> RefundCoordinator<StubLedger, StubFeed> {
        RefundCoordinator::new(ledger, feed, Arc::new(CounterKeys::starting_at(0)))
    }

    #[tokio::test]
    async fn test_refund_deposits_full_amount() {
        let ledger = Arc::new(StubLedger::new());
        let feed = Arc::new(StubFeed::new());
        let subject = coordinator(ledger.clone(), feed.clone());

        let result = subject.refund(&draft(), cause()).await;

        assert!(matches!(result, OrderError::Refunded { .. }));
        assert_eq!(ledger.pot_total(Pot::Refund), Pence::new(1200));

        let items = feed.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "REFUND");
        assert!(items[0].1.contains("123456"));
        assert!(items[0].1.contains("£12.00"));
    }

    #[tokio::test]
    async fn test_missing_identity_is_unrecoverable() {
        let ledger = Arc::new(StubLedger::new());
        let feed = Arc::new(StubFeed::new());
        let subject = coordinator(ledger.clone(), feed.clone());

        let result = subject.refund(&OrderDraft::default(), cause()).await;

        assert!(matches!(result, OrderError::Unrecoverable { .. }));
        // No ledger write, no feed post
        assert!(ledger.movements().is_empty());
        assert!(feed.items().is_empty());
    }

    #[tokio::test]
    async fn test_feed_failure_does_not_block_refund() {
        let ledger = Arc::new(StubLedger::new());
        let feed = Arc::new(StubFeed::new());
        feed.set_fail(true);
        let subject = coordinator(ledger.clone(), feed);

        let result = subject.refund(&draft(), cause()).await;

        assert!(matches!(result, OrderError::Refunded { .. }));
        assert_eq!(ledger.pot_total(Pot::Refund), Pence::new(1200));
    }

    #[tokio::test]
    async fn test_deposit_failure_combines_both_errors() {
        let ledger = Arc::new(StubLedger::new());
        ledger.set_fail(true);
        let feed = Arc::new(StubFeed::new());
        let subject = coordinator(ledger, feed);

        let result = subject.refund(&draft(), cause()).await;

        match result {
            OrderError::RefundFailed { deposit, cause } => {
                let message = format!("deposit: {} cause: {}", deposit, cause);
                assert!(message.contains("refund"));
                assert!(message.contains("EUR"));
            }
            other => panic!("Expected RefundFailed, got {:?}", other),
        }
    }
}
