//! # Sale Configuration & Constants
//!
//! Fixed-point parameters, devnet defaults, and the creation parameters of a
//! sale coordinator. Creation parameters are validated once, at deployment;
//! after that they are immutable.

use chrono::{DateTime, Utc};
use ethnum::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::{units, Amount, Price};

// ---------------------------------------------------------------------------
// Fixed-Point Parameters
// ---------------------------------------------------------------------------

/// Fractional decimal digits of both the sellable unit and the native
/// currency.
pub const DECIMALS: u32 = 18;

/// `10^DECIMALS`: base units per whole unit, and the fixed-point scale of
/// [`Price`].
pub const SCALE: U256 = U256::new(1_000_000_000_000_000_000);

// ---------------------------------------------------------------------------
// Devnet Defaults
// ---------------------------------------------------------------------------

/// Name of the token deployed by default.
pub const DEFAULT_TOKEN_NAME: &str = "NME Wrestling Token";

/// Ticker of the token deployed by default.
pub const DEFAULT_TOKEN_SYMBOL: &str = "NME";

/// Whole units minted to the deployer, and offered for sale, by default.
pub const DEFAULT_MAX_SUPPLY: u64 = 1_000_000;

/// Default price per unit, in native coins.
pub const DEFAULT_PRICE: &str = "0.025";

/// Default per-transaction purchase bounds, in whole units.
pub const DEFAULT_MIN_PURCHASE: u64 = 10;
pub const DEFAULT_MAX_PURCHASE: u64 = 100;

/// Default sale start: 2021-09-01T00:00:00Z.
pub const DEFAULT_SALE_START_SECS: i64 = 1_630_464_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejected creation parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The initial price is zero.
    #[error("price must be positive")]
    ZeroPrice,

    /// A size parameter is zero.
    #[error("{field} must be positive")]
    ZeroLimit {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The per-transaction minimum exceeds the maximum.
    #[error("minimum purchase {min} exceeds maximum purchase {max}")]
    InvertedBounds {
        /// Configured minimum, in base units.
        min: Amount,
        /// Configured maximum, in base units.
        max: Amount,
    },

    /// A single purchase could exceed the whole sale.
    #[error("maximum purchase {max_purchase} exceeds units for sale {max_units}")]
    PurchaseExceedsSupply {
        /// Configured maximum purchase, in base units.
        max_purchase: Amount,
        /// Configured sale ceiling, in base units.
        max_units: Amount,
    },

    /// The configuration file could not be decoded.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Sale Parameters
// ---------------------------------------------------------------------------

/// Numeric creation parameters of a sale coordinator.
///
/// Amount fields are written in whole units in JSON (`"10"`, `"0.5"`);
/// `sale_start` is unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Native coins per whole unit.
    pub price: Price,
    /// Ceiling on cumulative units sold.
    #[serde(with = "units")]
    pub max_units: Amount,
    /// Smallest accepted purchase.
    #[serde(with = "units")]
    pub min_purchase: Amount,
    /// Largest accepted purchase.
    #[serde(with = "units")]
    pub max_purchase: Amount,
    /// Purchases before this instant are rejected.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub sale_start: DateTime<Utc>,
}

impl SaleConfig {
    /// Checks the invariants every coordinator relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule, checked in field order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price.is_zero() {
            return Err(ConfigError::ZeroPrice);
        }
        for (field, value) in [
            ("max_units", self.max_units),
            ("min_purchase", self.min_purchase),
            ("max_purchase", self.max_purchase),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroLimit { field });
            }
        }
        if self.min_purchase > self.max_purchase {
            return Err(ConfigError::InvertedBounds {
                min: self.min_purchase,
                max: self.max_purchase,
            });
        }
        if self.max_purchase > self.max_units {
            return Err(ConfigError::PurchaseExceedsSupply {
                max_purchase: self.max_purchase,
                max_units: self.max_units,
            });
        }
        Ok(())
    }
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            price: Price::from_raw(Amount::new(25_000_000_000_000_000)),
            max_units: Amount::from_units(DEFAULT_MAX_SUPPLY),
            min_purchase: Amount::from_units(DEFAULT_MIN_PURCHASE),
            max_purchase: Amount::from_units(DEFAULT_MAX_PURCHASE),
            sale_start: DateTime::from_timestamp(DEFAULT_SALE_START_SECS, 0).unwrap_or_default(),
        }
    }
}
