//! # Fixed-Point Amounts and Prices
//!
//! Token and native-currency quantities are 256-bit unsigned integers counted
//! in base units, with [`DECIMALS`] fractional digits (`1 unit == 10^18`
//! base units). A [`Price`] is the number of native base units charged per
//! whole unit, stored with the same 18-digit scale.
//!
//! No floating point anywhere. The payment check in the sale coordinator is
//! an exact equality, and binary floats cannot represent `0.025` exactly.

use ethnum::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{DECIMALS, SCALE};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced when parsing an amount or a price from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The input was empty.
    #[error("empty amount")]
    Empty,

    /// The input contained something other than digits and a single dot.
    #[error("invalid amount: {0:?}")]
    InvalidDigit(String),

    /// More fractional digits than the fixed-point scale can hold.
    #[error("too many decimal places: at most {max} allowed")]
    TooManyDecimals {
        /// Maximum number of fractional digits.
        max: u32,
    },

    /// The value does not fit in 256 bits.
    #[error("amount overflows 256 bits")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A quantity of tokens or native currency, in base units.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(U256);

impl Amount {
    /// Zero base units.
    pub const ZERO: Amount = Amount(U256::ZERO);

    /// Creates an amount from a raw base-unit count.
    pub const fn new(base_units: u128) -> Self {
        Self(U256::new(base_units))
    }

    /// Wraps a raw 256-bit value.
    pub const fn from_u256(value: U256) -> Self {
        Self(value)
    }

    /// `whole` units, scaled to base units (`whole * 10^18`).
    pub fn from_units(whole: u64) -> Self {
        Self(U256::from(whole) * SCALE)
    }

    /// The raw 256-bit base-unit value.
    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// `self - rhs`, clamped at zero.
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        self.checked_sub(rhs).unwrap_or(Amount::ZERO)
    }

    /// Parses a human-readable decimal in whole units, e.g. `"999990"` or
    /// `"0.025"`, into base units. Exact; rejects more than 18 decimals.
    pub fn parse_units(s: &str) -> Result<Amount, AmountError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Empty);
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::InvalidDigit(s.to_string()));
        }
        if frac.len() > DECIMALS as usize {
            return Err(AmountError::TooManyDecimals { max: DECIMALS });
        }

        let whole_value = if whole.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(whole, 10).map_err(|_| AmountError::Overflow)?
        };
        let padded = format!("{:0<width$}", frac, width = DECIMALS as usize);
        let frac_value = U256::from_str_radix(&padded, 10).map_err(|_| AmountError::Overflow)?;

        whole_value
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac_value))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// Formats base units as a whole-unit decimal with trailing zeros
    /// trimmed: `10^18 -> "1"`, `25 * 10^15 -> "0.025"`.
    pub fn format_units(&self) -> String {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == U256::ZERO {
            return whole.to_string();
        }
        let frac_digits = format!("{:0>width$}", frac.to_string(), width = DECIMALS as usize);
        format!("{}.{}", whole, frac_digits.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parses a raw base-unit integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidDigit(s.to_string()));
        }
        U256::from_str_radix(s, 10)
            .map(Amount)
            .map_err(|_| AmountError::Overflow)
    }
}

impl From<u64> for Amount {
    fn from(n: u64) -> Self {
        Self(U256::from(n))
    }
}

impl From<u128> for Amount {
    fn from(n: u128) -> Self {
        Self(U256::new(n))
    }
}

/// Base-unit decimal string on the wire. JSON numbers cannot carry 256 bits.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "units")]` adapter: whole-unit decimal strings
/// (`"0.025"`) instead of base units. Used by configuration files.
pub mod units {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.format_units())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::parse_units(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Native base units charged per whole unit, as an 18-decimal fixed-point
/// value. `Price::from_whole(1)` means one whole native coin per whole unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Amount);

impl Price {
    /// Wraps a raw scaled value (`1.0 == 10^18`).
    pub const fn from_raw(raw: Amount) -> Self {
        Self(raw)
    }

    /// A price of `whole` native coins per unit.
    pub fn from_whole(whole: u64) -> Self {
        Self(Amount::from_units(whole))
    }

    /// Parses a decimal price such as `"0.025"`.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        Amount::parse_units(s).map(Self)
    }

    /// The raw scaled value.
    pub const fn raw(&self) -> Amount {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The exact native payment for `amount` base units:
    /// `amount * raw / 10^18`.
    ///
    /// Returns `None` when the product overflows or is not a whole number
    /// of native base units; no payment can match such a quote.
    pub fn quote(&self, amount: Amount) -> Option<Amount> {
        let product = amount.as_u256().checked_mul(self.0.as_u256())?;
        if product % SCALE != U256::ZERO {
            return None;
        }
        Some(Amount::from_u256(product / SCALE))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.format_units())
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({})", self.0.format_units())
    }
}

impl FromStr for Price {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whole-unit decimal string on the wire, e.g. `"0.025"`.
impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        units::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        units::deserialize(deserializer).map(Self)
    }
}
