//! # Deployment
//!
//! Wires a complete sale in one step: the token, the access gate, the sale
//! coordinator, and the funding transfer that stocks the coordinator. The
//! deployer ends up as token holder, gate administrator, and sale owner.
//!
//! Contract addresses are derived from the deployer with
//! [`Address::derive`], nonces 0 (token), 1 (gate), 2 (sale).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::access_gate::{AccessGate, SharedGate};
use crate::address::Address;
use crate::amount::{units, Amount};
use crate::config::{
    ConfigError, SaleConfig, DECIMALS, DEFAULT_MAX_SUPPLY, DEFAULT_TOKEN_NAME,
    DEFAULT_TOKEN_SYMBOL,
};
use crate::ledger::{InMemoryLedger, LedgerError, TokenLedger, TokenMetadata};
use crate::sale_coordinator::{SaleCoordinator, SaleError};

/// Errors that abort a deployment.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The coordinator could not be created.
    #[error(transparent)]
    Sale(#[from] SaleError),

    /// The funding transfer failed.
    #[error("funding transfer failed: {0}")]
    Funding(#[from] LedgerError),
}

/// Token parameters of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    /// Whole units minted to the deployer.
    #[serde(with = "units")]
    pub max_supply: Amount,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOKEN_NAME.into(),
            symbol: DEFAULT_TOKEN_SYMBOL.into(),
            max_supply: Amount::from_units(DEFAULT_MAX_SUPPLY),
        }
    }
}

/// Everything needed to stand up a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub sale: SaleConfig,
    /// Whole units moved from the deployer to the coordinator after
    /// creation. Defaults to the whole token supply.
    #[serde(default, with = "optional_units")]
    pub funding: Option<Amount>,
}

impl DeploymentConfig {
    /// Decodes a JSON deployment file.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Units the coordinator is funded with.
    pub fn funding_amount(&self) -> Amount {
        self.funding.unwrap_or(self.token.max_supply)
    }
}

/// A deployed, funded sale and the contracts around it.
pub struct Deployment {
    pub deployer: Address,
    pub token: Arc<Mutex<InMemoryLedger>>,
    pub native: Arc<Mutex<InMemoryLedger>>,
    pub gate: SharedGate,
    pub sale: SaleCoordinator,
}

impl Deployment {
    /// Deploys token, gate and sale from `deployer`, then funds the sale.
    ///
    /// `native` is the payment-currency ledger the sale collects into; it is
    /// not deployed here because it belongs to the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Config`] or [`DeploymentError::Sale`] for
    /// rejected parameters, and [`DeploymentError::Funding`] if the deployer
    /// cannot cover the funding amount.
    pub fn deploy(
        config: &DeploymentConfig,
        deployer: Address,
        native: Arc<Mutex<InMemoryLedger>>,
    ) -> Result<Self, DeploymentError> {
        config.sale.validate()?;

        let token_address = Address::derive(&deployer, 0);
        let gate_address = Address::derive(&deployer, 1);
        let sale_address = Address::derive(&deployer, 2);

        let token = InMemoryLedger::deploy(
            token_address,
            TokenMetadata {
                name: config.token.name.clone(),
                symbol: config.token.symbol.clone(),
                decimals: DECIMALS,
            },
            config.token.max_supply,
            deployer,
        )
        .into_shared();

        let gate = AccessGate::new(gate_address, deployer).into_shared();

        let sale = SaleCoordinator::new(
            sale_address,
            deployer,
            config.sale.clone(),
            token.clone(),
            native.clone(),
            gate.clone(),
        )?;

        let funding = config.funding_amount();
        token.lock().transfer(&deployer, &sale_address, funding)?;
        tracing::info!(
            sale = %sale_address,
            funding = %funding.format_units(),
            "units transferred to sale"
        );

        Ok(Self {
            deployer,
            token,
            native,
            gate,
            sale,
        })
    }
}

/// `Option<Amount>` in whole units.
mod optional_units {
    use crate::amount::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        amount: &Option<Amount>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match amount {
            Some(a) => serializer.serialize_some(&a.format_units()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Amount>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Amount::parse_units(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
