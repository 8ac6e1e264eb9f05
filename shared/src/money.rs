//! Money as integer minor currency units
//!
//! All ledger arithmetic is done on `Amount` (an `i64` count of minor units,
//! e.g. cents). Decimal strings only exist at the presentation boundary:
//! `Amount::parse_str` and `Display` convert through `rust_decimal` so that
//! "12.34" round-trips without floating point.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Minor units per major unit (cents per euro/dollar)
const MINOR_PER_MAJOR: i64 = 100;

/// Minimum amount accepted by card-family rails (50 minor units)
pub const CARD_MINIMUM: Amount = Amount(50);

/// Maximum allowed amount per payment (1,000,000.00 in minor units)
pub const MAX_PAYMENT_AMOUNT: Amount = Amount(1_000_000 * MINOR_PER_MAJOR);

/// A monetary amount in integer minor currency units.
///
/// Currency is implicit on the order; this type only carries the count of
/// minor units and is serialized as a bare integer on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

/// Errors from parsing a decimal string into an `Amount`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("not a decimal number: {0}")]
    NotANumber(String),

    #[error("more than two decimal places: {0}")]
    TooPrecise(String),

    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construct from a raw count of minor units
    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    /// Raw count of minor units
    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition, `None` on overflow
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Saturating subtraction clamped at zero, for advisory display values
    pub fn saturating_sub_floor_zero(self, other: Amount) -> Amount {
        Amount((self.0 - other.0).max(0))
    }

    /// Parse a decimal string ("12.34") into minor units.
    ///
    /// Rejects more than two decimal places instead of rounding; a till must
    /// never charge an amount the operator did not type.
    pub fn parse_str(input: &str) -> Result<Amount, AmountParseError> {
        let decimal = Decimal::from_str(input.trim())
            .map_err(|_| AmountParseError::NotANumber(input.to_string()))?;

        if decimal.scale() > 2 {
            return Err(AmountParseError::TooPrecise(input.to_string()));
        }

        let minor = (decimal * Decimal::from(MINOR_PER_MAJOR))
            .to_i64()
            .ok_or_else(|| AmountParseError::OutOfRange(input.to_string()))?;

        if minor.abs() > MAX_PAYMENT_AMOUNT.minor() {
            return Err(AmountParseError::OutOfRange(input.to_string()));
        }

        Ok(Amount(minor))
    }
}

impl std::fmt::Display for Amount {
    /// Formats as a major-unit decimal string with two places ("12.34")
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let decimal = Decimal::new(self.0, 2);
        write!(f, "{:.2}", decimal)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}
