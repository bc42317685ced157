//! Order processor: the validate → fulfill → refund pipeline.
//!
//! One call per webhook delivery. A validation rejection routes
//! straight to the refund path; a fulfillment failure routes there with
//! the full order identity. The caller decides what to do with the
//! terminal error (log + operational feed; never an automatic retry).

use tracing::debug;

use onramp_domain::OrderDraft;
use onramp_exec::{AccessCodeStore, ExchangeClient, FeedClient, LedgerClient};

use crate::error::OrderError;
use crate::fulfill::{FulfillReceipt, FulfillmentEngine};
use crate::refund::RefundCoordinator;
use crate::validate::{OrderValidator, Rejection, Screened};

/// Successful outcome of processing one notification.
#[derive(Debug)]
pub enum Outcome {
    /// Order validated, purchased, and delivered
    Fulfilled(FulfillReceipt),
    /// Outgoing/zero transaction, silently ignored
    Ignored,
}

/// Full order pipeline over a shared set of collaborators.
pub struct OrderProcessor<X, L, F, R>
where
    X: ExchangeClient,
    L: LedgerClient,
    F: FeedClient,
    R: AccessCodeStore,
{
    validator: OrderValidator<R>,
    engine: FulfillmentEngine<X, L>,
    refunder: RefundCoordinator<L, F>,
}

impl<X, L, F, R> OrderProcessor<X, L, F, R>
where
    X: ExchangeClient,
    L: LedgerClient,
    F: FeedClient,
    R: AccessCodeStore,
{
    /// Assemble the pipeline from its three stages.
    pub fn new(
        validator: OrderValidator<R>,
        engine: FulfillmentEngine<X, L>,
        refunder: RefundCoordinator<L, F>,
    ) -> Self {
        Self {
            validator,
            engine,
            refunder,
        }
    }

    /// Process one raw notification body end to end.
    pub async fn process(&self, raw: &[u8]) -> Result<Outcome, OrderError> {
        let order = match self.validator.validate(raw).await {
            Ok(Screened::Accepted(order)) => order,
            Ok(Screened::Ignored) => {
                debug!("Notification ignored (outgoing or zero amount)");
                return Ok(Outcome::Ignored);
            }
            Err(Rejection { reason, draft }) => {
                return Err(self.refunder.refund(&draft, reason.into()).await);
            }
        };

        match self.engine.fulfill(&order).await {
            Ok(receipt) => Ok(Outcome::Fulfilled(receipt)),
            Err(e) => Err(self.refunder.refund(&OrderDraft::from(&order), e.into()).await),
        }
    }

    /// The fulfillment engine (diagnostic access).
    pub fn engine(&self) -> &FulfillmentEngine<X, L> {
        &self.engine
    }
}
