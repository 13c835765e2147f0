//! # Token Ledger
//!
//! The sale coordinator never stores balances itself. It talks to a
//! [`TokenLedger`]: one for the sellable unit, one for the native payment
//! currency. Any balance store that can answer `balance_of` and perform a
//! checked `transfer` can sit behind the trait.
//!
//! [`InMemoryLedger`] is the reference implementation: a fixed-supply token
//! whose whole supply is minted to the deployer at creation, with the usual
//! per-holder balances and a `Transfer` log. Without metadata it doubles as
//! the native-currency ledger, seeded through [`InMemoryLedger::credit`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;
use crate::events::{EventLog, LedgerEvent};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by a ledger transfer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The sender does not hold enough.
    #[error("insufficient balance: {holder} has {balance}, tried to move {amount}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Its current balance.
        balance: Amount,
        /// Amount requested.
        amount: Amount,
    },

    /// A balance or the total supply would exceed 256 bits.
    #[error("amount overflow: crediting {amount} would exceed 256 bits")]
    AmountOverflow {
        /// Amount that was being credited.
        amount: Amount,
    },
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::AmountOverflow { .. } => "amount_overflow",
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A balance store for one fungible asset.
pub trait TokenLedger: Send + Sync {
    /// The ledger's own address, as referenced by other contracts.
    fn address(&self) -> Address;

    /// Balance of `holder`; zero for unknown holders.
    fn balance_of(&self, holder: &Address) -> Amount;

    /// Moves `amount` from `from` to `to`.
    ///
    /// Either both balances change or neither does.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount)
        -> Result<(), LedgerError>;
}

/// A ledger shared between contracts.
pub type SharedLedger = Arc<Mutex<dyn TokenLedger>>;

// ---------------------------------------------------------------------------
// Reference Implementation
// ---------------------------------------------------------------------------

/// Descriptive metadata of a deployed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Human-readable name, e.g. "NME Wrestling Token".
    pub name: String,
    /// Ticker, e.g. "NME".
    pub symbol: String,
    /// Fractional digits. Always 18 for tokens deployed here.
    pub decimals: u32,
}

/// In-memory balance store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryLedger {
    address: Address,
    metadata: Option<TokenMetadata>,
    total_supply: Amount,
    balances: HashMap<Address, Amount>,
    events: EventLog<LedgerEvent>,
}

impl InMemoryLedger {
    /// Deploys a fixed-supply token and mints `supply` to `deployer`.
    pub fn deploy(
        address: Address,
        metadata: TokenMetadata,
        supply: Amount,
        deployer: Address,
    ) -> Self {
        let mut ledger = Self {
            address,
            metadata: Some(metadata),
            total_supply: supply,
            balances: HashMap::from([(deployer, supply)]),
            events: EventLog::new(),
        };
        ledger.events.emit(LedgerEvent::Transfer {
            from: Address::ZERO,
            to: deployer,
            amount: supply,
        });
        tracing::info!(
            token = %address,
            deployer = %deployer,
            supply = %supply.format_units(),
            "token deployed"
        );
        ledger
    }

    /// An empty ledger for the native payment currency.
    pub fn native(address: Address) -> Self {
        Self {
            address,
            metadata: None,
            total_supply: Amount::ZERO,
            balances: HashMap::new(),
            events: EventLog::new(),
        }
    }

    /// Creates `amount` out of thin air and credits it to `to`.
    ///
    /// Only the deployment path and the native faucet use this; contracts
    /// move existing balances through [`TokenLedger::transfer`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AmountOverflow`] if the total supply or the
    /// recipient balance would exceed 256 bits.
    pub fn credit(&mut self, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow { amount })?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow { amount })?;

        self.total_supply = new_supply;
        self.balances.insert(*to, new_balance);
        self.events.emit(LedgerEvent::Transfer {
            from: Address::ZERO,
            to: *to,
            amount,
        });
        Ok(())
    }

    /// Wraps the ledger for sharing between contracts.
    pub fn into_shared(self) -> Arc<Mutex<InMemoryLedger>> {
        Arc::new(Mutex::new(self))
    }

    pub fn metadata(&self) -> Option<&TokenMetadata> {
        self.metadata.as_ref()
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Number of holders with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| !b.is_zero()).count()
    }

    pub fn events(&self) -> &EventLog<LedgerEvent> {
        &self.events
    }
}

impl TokenLedger for InMemoryLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or(Amount::ZERO)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let from_balance = self.balance_of(from);
        let debited = from_balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                holder: *from,
                balance: from_balance,
                amount,
            })?;

        if from != to {
            let credited = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(LedgerError::AmountOverflow { amount })?;
            self.balances.insert(*from, debited);
            self.balances.insert(*to, credited);
        }

        self.events.emit(LedgerEvent::Transfer {
            from: *from,
            to: *to,
            amount,
        });
        tracing::trace!(ledger = %self.address, %from, %to, %amount, "transfer");
        Ok(())
    }
}
