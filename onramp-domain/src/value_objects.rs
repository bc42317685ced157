//! Value Objects for the Onramp Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Destination address must be 0x-prefixed 40-hex-digit
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    /// Amount policy bounds must be ordered
    #[error("Invalid amount policy: {0}")]
    InvalidAmountPolicy(String),

    /// Pot name not recognized
    #[error("Unknown pot: {0}")]
    UnknownPot(String),
}

// =============================================================================
// Pence
// =============================================================================

/// Signed monetary amount in minor currency units (pence).
///
/// All ledger movements are integer pence; a negative value is a
/// withdrawal, a positive value a deposit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pence(i64);

impl Pence {
    /// Zero pence.
    pub const ZERO: Pence = Pence(0);

    /// Create from a raw minor-unit amount.
    pub const fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Get the raw minor-unit amount.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Whole currency units as a float (pence / 100).
    pub fn as_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// True for amounts strictly greater than zero.
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Pence {
    type Output = Pence;

    fn add(self, rhs: Pence) -> Pence {
        Pence(self.0 + rhs.0)
    }
}

impl AddAssign for Pence {
    fn add_assign(&mut self, rhs: Pence) {
        self.0 += rhs.0;
    }
}

impl Sub for Pence {
    type Output = Pence;

    fn sub(self, rhs: Pence) -> Pence {
        Pence(self.0 - rhs.0)
    }
}

impl Neg for Pence {
    type Output = Pence;

    fn neg(self) -> Pence {
        Pence(-self.0)
    }
}

impl fmt::Display for Pence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}£{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// DestinationAddress
// =============================================================================

/// A 20-byte crypto destination address.
///
/// # Invariants
/// - Parsed only from the canonical form `^0x[0-9a-fA-F]{40}$`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationAddress([u8; 20]);

impl DestinationAddress {
    /// Parse an address from its canonical hex form.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAddress` if the input is not a
    /// 0x-prefixed string of exactly 40 hex digits.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| DomainError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;

        if digits.len() != 40 {
            return Err(DomainError::InvalidAddress(format!(
                "expected 40 hex digits, got {}",
                digits.len()
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| DomainError::InvalidAddress(format!("{}: {}", e, s)))?;

        Ok(Self(bytes))
    }

    /// The raw 20 address bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for DestinationAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Pot
// =============================================================================

/// Named internal ledger sub-account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pot {
    /// Working capital
    Float,
    /// Funds backing purchased-but-undelivered asset
    ExchangeInventory,
    /// Retained commission
    Profit,
    /// Money returned to failed orders
    Refund,
}

impl Pot {
    /// Stable wire name used by ledger providers.
    pub const fn name(&self) -> &'static str {
        match self {
            Pot::Float => "float",
            Pot::ExchangeInventory => "exchange-inventory",
            Pot::Profit => "profit",
            Pot::Refund => "refund",
        }
    }

    /// All pots, in a stable order.
    pub const ALL: [Pot; 4] = [Pot::Float, Pot::ExchangeInventory, Pot::Profit, Pot::Refund];
}

impl fmt::Display for Pot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Pot {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" => Ok(Pot::Float),
            "exchange-inventory" => Ok(Pot::ExchangeInventory),
            "profit" => Ok(Pot::Profit),
            "refund" => Ok(Pot::Refund),
            other => Err(DomainError::UnknownPot(other.to_string())),
        }
    }
}

// =============================================================================
// AmountPolicy
// =============================================================================

/// Acceptance policy for incoming transfer amounts.
///
/// Both variants exist operationally: an exact required amount, or an
/// inclusive bounded range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountPolicy {
    /// Accept only this exact amount
    Exact(Pence),
    /// Accept any amount within the inclusive range
    Range {
        /// Minimum accepted amount (inclusive)
        min: Pence,
        /// Maximum accepted amount (inclusive)
        max: Pence,
    },
}

impl AmountPolicy {
    /// Create an inclusive range policy.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAmountPolicy` if `min > max`.
    pub fn range(min: Pence, max: Pence) -> Result<Self, DomainError> {
        if min > max {
            return Err(DomainError::InvalidAmountPolicy(format!(
                "min {} exceeds max {}",
                min, max
            )));
        }
        Ok(Self::Range { min, max })
    }

    /// Whether the policy accepts the given amount.
    pub fn accepts(&self, amount: Pence) -> bool {
        match *self {
            AmountPolicy::Exact(required) => amount == required,
            AmountPolicy::Range { min, max } => amount >= min && amount <= max,
        }
    }
}

impl fmt::Display for AmountPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountPolicy::Exact(required) => write!(f, "exactly {}", required),
            AmountPolicy::Range { min, max } => write!(f, "{} - {}", min, max),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
