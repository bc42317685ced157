//! Domain entities: inbound notifications and validated orders.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::value_objects::{DestinationAddress, Pence};

/// Notification type processed by the system. All others are rejected.
pub const TRANSACTION_CREATED: &str = "transaction.created";

// =============================================================================
// Inbound notification payload
// =============================================================================

/// Counterparty identity on an incoming transfer.
///
/// The sort code and account number are opaque strings used only for
/// refund routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counterparty {
    /// Display name (unused by the core)
    #[serde(default)]
    pub name: String,
    /// Bank sort code
    #[serde(default)]
    pub sort_code: String,
    /// Bank account number
    #[serde(default)]
    pub account_number: String,
}

/// Transaction details inside a webhook notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionData {
    /// Free-text reference: a destination address or an access code
    #[serde(default)]
    pub description: String,
    /// Amount in minor currency units; negative or zero for outgoing
    #[serde(default)]
    pub amount: i64,
    /// ISO currency code
    #[serde(default)]
    pub currency: String,
    /// Originating account identity
    #[serde(default)]
    pub counterparty: Counterparty,
}

/// Raw webhook notification from the banking provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionNotification {
    /// Notification type; only `transaction.created` is processed
    #[serde(rename = "type")]
    pub kind: String,
    /// Transaction payload
    pub data: TransactionData,
}

// =============================================================================
// Order
// =============================================================================

/// One validated incoming transfer.
///
/// # Invariants
/// - `amount > 0` (amount <= 0 is screened out before construction)
/// - Immutable after construction; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Correlation id for logs and alerts
    pub id: Uuid,
    /// Counterparty sort code (refund routing)
    pub sort_code: String,
    /// Counterparty account number (refund routing)
    pub account_number: String,
    /// ISO currency code of the transfer
    pub currency: String,
    /// Transferred amount in minor units
    pub amount: Pence,
    /// Where the purchased asset is delivered
    pub destination: DestinationAddress,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ {} {} {} {} {} }}",
            self.sort_code, self.account_number, self.currency, self.amount, self.destination
        )
    }
}

// =============================================================================
// OrderDraft
// =============================================================================

/// Possibly-partial counterparty identity captured during validation.
///
/// When validation fails before all fields are populated, the draft
/// carries whatever was extracted so the refund path can decide whether
/// a refund is routable at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDraft {
    /// Counterparty sort code, possibly empty
    pub sort_code: String,
    /// Counterparty account number, possibly empty
    pub account_number: String,
    /// Currency code, possibly empty
    pub currency: String,
    /// Transfer amount; zero until populated
    pub amount: Pence,
}

impl OrderDraft {
    /// Whether the draft carries enough identity to route a refund.
    pub fn has_refund_identity(&self) -> bool {
        !self.sort_code.is_empty() && !self.account_number.is_empty() && !self.currency.is_empty()
    }
}

impl From<&Order> for OrderDraft {
    fn from(order: &Order) -> Self {
        Self {
            sort_code: order.sort_code.clone(),
            account_number: order.account_number.clone(),
            currency: order.currency.clone(),
            amount: order.amount,
        }
    }
}

impl fmt::Display for OrderDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ {} {} {} {} }}",
            self.sort_code, self.account_number, self.currency, self.amount
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
