//! Order validation.
//!
//! Turns a raw webhook body into a validated `Order`, a silent ignore
//! (outgoing transactions), or a classified rejection carrying whatever
//! counterparty identity was extracted before the failing rule, so the
//! refund path can decide whether the money can be returned.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use onramp_domain::{
    AmountPolicy, DestinationAddress, Order, OrderDraft, Pence, TransactionNotification,
    TRANSACTION_CREATED,
};
use onramp_exec::AccessCodeStore;

use crate::error::ValidationError;

/// The only currency the service accepts.
pub const ACCEPTED_CURRENCY: &str = "GBP";

// =============================================================================
// Results
// =============================================================================

/// Outcome of screening a notification.
#[derive(Debug)]
pub enum Screened {
    /// A valid order, ready for fulfillment
    Accepted(Order),
    /// Outgoing or zero-amount transaction: not an error, no refund,
    /// no fulfillment
    Ignored,
}

/// A rejected notification: the classified reason plus the
/// partially-populated draft for refund routing.
#[derive(Debug)]
pub struct Rejection {
    /// First rule that failed
    pub reason: ValidationError,
    /// Counterparty identity extracted before the failure
    pub draft: OrderDraft,
}

// =============================================================================
// Validator
// =============================================================================

/// Validates inbound transfer notifications.
///
/// Rules apply in order, first failure wins:
/// 1. body decodes  2. type is `transaction.created`  3. fields populate
/// 4. amount > 0 (else ignore)  5. counterparty present  6. amount
/// within policy  7. currency is GBP  8. reference resolves to a
/// destination address.
pub struct OrderValidator<R: AccessCodeStore> {
    policy: AmountPolicy,
    codes: Arc<R>,
}

impl<R: AccessCodeStore> OrderValidator<R> {
    /// Create a validator with the configured acceptance policy.
    pub fn new(policy: AmountPolicy, codes: Arc<R>) -> Self {
        Self { policy, codes }
    }

    /// Screen a raw notification body.
    ///
    /// The only side effect is the access-code lookup in rule 8.
    pub async fn validate(&self, raw: &[u8]) -> Result<Screened, Rejection> {
        let notification: TransactionNotification =
            serde_json::from_slice(raw).map_err(|e| Rejection {
                reason: ValidationError::MalformedPayload(e.to_string()),
                draft: OrderDraft::default(),
            })?;

        if notification.kind != TRANSACTION_CREATED {
            return Err(Rejection {
                reason: ValidationError::UnexpectedType(notification.kind),
                draft: OrderDraft::default(),
            });
        }

        let data = notification.data;
        let draft = OrderDraft {
            sort_code: data.counterparty.sort_code,
            account_number: data.counterparty.account_number,
            currency: data.currency,
            amount: Pence::new(data.amount),
        };

        // Outgoing (or zero) transaction: our own money moving, not an
        // order. Short-circuit with no refund and no fulfillment.
        if !draft.amount.is_positive() {
            debug!(amount = %draft.amount, "Ignoring non-incoming transaction");
            return Ok(Screened::Ignored);
        }

        if draft.sort_code.is_empty() || draft.account_number.is_empty() {
            return Err(Rejection {
                reason: ValidationError::MissingCounterparty,
                draft,
            });
        }

        if !self.policy.accepts(draft.amount) {
            return Err(Rejection {
                reason: ValidationError::AmountOutOfPolicy {
                    amount: draft.amount,
                    policy: self.policy,
                },
                draft,
            });
        }

        if draft.currency != ACCEPTED_CURRENCY {
            return Err(Rejection {
                reason: ValidationError::WrongCurrency(draft.currency.clone()),
                draft,
            });
        }

        let destination = match self.resolve_destination(data.description.trim()).await {
            Some(destination) => destination,
            None => {
                return Err(Rejection {
                    reason: ValidationError::UnresolvableDestination(data.description),
                    draft,
                })
            }
        };

        Ok(Screened::Accepted(Order {
            id: Uuid::now_v7(),
            sort_code: draft.sort_code,
            account_number: draft.account_number,
            currency: draft.currency,
            amount: draft.amount,
            destination,
        }))
    }

    /// The transfer reference is either itself a canonical address, or
    /// an access code registered to one.
    async fn resolve_destination(&self, reference: &str) -> Option<DestinationAddress> {
        if let Ok(address) = DestinationAddress::parse(reference) {
            return Some(address);
        }

        match self.codes.resolve(reference).await {
            Ok(found) => found,
            Err(e) => {
                debug!(reference, error = %e, "Access code lookup failed");
                None
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
    use onramp_exec::MemoryAccessCodes;

    const ADDR: &str = "0x52ec249dd2eec428b1e2f389c7d032caf5d1a238";

    fn validator() -> OrderValidator<MemoryAccessCodes> {
        let codes = MemoryAccessCodes::new();
        codes.insert("abc123", DestinationAddress::parse(ADDR).unwrap());
        OrderValidator::new(
            AmountPolicy::range(Pence::new(100), Pence::new(5000)).unwrap(),
            Arc::new(codes),
        )
    }

    fn body(kind: &str, desc: &str, amount: i64, currency: &str, sc: &str, an: &str) -> Vec<u8> {
        serde_json::json!({
            "type": kind,
            "data": {
                "description": desc,
                "amount": amount,
                "currency": currency,
                "counterparty": { "sort_code": sc, "account_number": an }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_accepts_valid_transfer_with_address_reference() {
        let raw = body("transaction.created", ADDR, 1200, "GBP", "123456", "12345678");

        match validator().validate(&raw).await.unwrap() {
            Screened::Accepted(order) => {
                assert_eq!(order.amount, Pence::new(1200));
                assert_eq!(order.destination.to_hex(), ADDR);
                assert_eq!(order.sort_code, "123456");
            }
            other => panic!("Expected Accepted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accepts_access_code_reference() {
        let raw = body("transaction.created", "abc123", 1200, "GBP", "123456", "12345678");

        match validator().validate(&raw).await.unwrap() {
            Screened::Accepted(order) => assert_eq!(order.destination.to_hex(), ADDR),
            other => panic!("Expected Accepted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let rejection = validator().validate(b"not json").await.unwrap_err();

        assert!(matches!(rejection.reason, ValidationError::MalformedPayload(_)));
        assert!(!rejection.draft.has_refund_identity());
    }

    #[tokio::test]
    async fn test_unexpected_type() {
        let raw = body("pot.updated", ADDR, 1200, "GBP", "123456", "12345678");

        let rejection = validator().validate(&raw).await.unwrap_err();

        assert!(matches!(rejection.reason, ValidationError::UnexpectedType(_)));
    }

    #[tokio::test]
    async fn test_outgoing_transaction_is_ignored_not_rejected() {
        let raw = body("transaction.created", "", -1200, "GBP", "", "");

        assert!(matches!(
            validator().validate(&raw).await.unwrap(),
            Screened::Ignored
        ));

        let zero = body("transaction.created", "", 0, "GBP", "", "");
        assert!(matches!(
            validator().validate(&zero).await.unwrap(),
            Screened::Ignored
        ));
    }

    #[tokio::test]
    async fn test_missing_counterparty() {
        let raw = body("transaction.created", ADDR, 1200, "GBP", "", "12345678");

        let rejection = validator().validate(&raw).await.unwrap_err();

        assert!(matches!(rejection.reason, ValidationError::MissingCounterparty));
        // Amount was populated before the rule failed
        assert_eq!(rejection.draft.amount, Pence::new(1200));
    }

    #[tokio::test]
    async fn test_amount_out_of_policy() {
        let raw = body("transaction.created", ADDR, 9999, "GBP", "123456", "12345678");

        let rejection = validator().validate(&raw).await.unwrap_err();

        assert!(matches!(
            rejection.reason,
            ValidationError::AmountOutOfPolicy { .. }
        ));
        assert!(rejection.draft.has_refund_identity());
    }

    #[tokio::test]
    async fn test_exact_policy_enforced() {
        let codes = Arc::new(MemoryAccessCodes::new());
        let exact = OrderValidator::new(AmountPolicy::Exact(Pence::new(1200)), codes);

        let ok = body("transaction.created", ADDR, 1200, "GBP", "123456", "12345678");
        assert!(matches!(
            exact.validate(&ok).await.unwrap(),
            Screened::Accepted(_)
        ));

        let bad = body("transaction.created", ADDR, 1199, "GBP", "123456", "12345678");
        assert!(matches!(
            exact.validate(&bad).await.unwrap_err().reason,
            ValidationError::AmountOutOfPolicy { .. }
        ));
    }

    #[tokio::test]
    async fn test_wrong_currency() {
        let raw = body("transaction.created", ADDR, 1200, "EUR", "123456", "12345678");

        let rejection = validator().validate(&raw).await.unwrap_err();

        assert!(matches!(rejection.reason, ValidationError::WrongCurrency(_)));
        assert!(rejection.draft.has_refund_identity());
    }

    #[tokio::test]
    async fn test_unresolvable_destination() {
        let raw = body(
            "transaction.created",
            "no such code",
            1200,
            "GBP",
            "123456",
            "12345678",
        );

        let rejection = validator().validate(&raw).await.unwrap_err();

        assert!(matches!(
            rejection.reason,
            ValidationError::UnresolvableDestination(_)
        ));
        // Refund is possible: identity was fully populated
        assert!(rejection.draft.has_refund_identity());
    }

    #[tokio::test]
    async fn test_rule_order_policy_before_currency() {
        // Both amount and currency are wrong; the amount rule fires first.
        let raw = body("transaction.created", ADDR, 9999, "EUR", "123456", "12345678");

        let rejection = validator().validate(&raw).await.unwrap_err();

        assert!(matches!(
            rejection.reason,
            ValidationError::AmountOutOfPolicy { .. }
        ));
    }
}
