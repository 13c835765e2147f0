//! # Sale Coordinator Contract
//!
//! Sells a pre-funded pool of units for native currency to allow-listed
//! beneficiaries, at an owner-controlled price and within fixed
//! per-transaction and cumulative limits. The lifecycle is:
//!
//! 1. **Create**: owner fixes the price, limits, start time, the unit ledger
//!    and the access gate.
//! 2. **Fund**: owner transfers sellable units to the coordinator's address
//!    in the unit ledger. Purchases fail with `InsufficientSupply` until then.
//! 3. **Buy**: approved beneficiaries receive units; payments accrue in the
//!    coordinator's native balance.
//! 4. **Finalize**: owner sweeps the remaining units and the native balance.
//!    The sale then refuses further purchases.
//!
//! ## Ordering
//!
//! `buy_tokens` validates every precondition and commits `units_sold` before
//! any ledger is touched. If a ledger transfer fails, everything the call
//! already did is reverted and the ledger error is returned. Mutating entry
//! points take `&mut self`, so a ledger cannot call back into the same
//! coordinator while a purchase is in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access_gate::SharedGate;
use crate::address::Address;
use crate::amount::{Amount, Price};
use crate::config::{ConfigError, SaleConfig};
use crate::events::{EventLog, SaleEvent};
use crate::ledger::{LedgerError, SharedLedger, TokenLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during sale operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaleError {
    /// The caller lacks the required role, or the beneficiary is not on the
    /// allow-list.
    #[error("unauthorized: {caller} is not permitted to perform this call")]
    Unauthorized {
        /// The rejected caller or beneficiary.
        caller: Address,
    },

    /// The sale has not opened yet.
    #[error("sale has not started yet: opens at {start}")]
    NotStarted {
        /// Configured sale start.
        start: DateTime<Utc>,
    },

    /// Purchase below the per-transaction minimum.
    #[error("amount {amount} is less than minimum purchase {minimum}")]
    BelowMinimum {
        /// Requested base units.
        amount: Amount,
        /// Configured minimum.
        minimum: Amount,
    },

    /// Purchase above the per-transaction maximum.
    #[error("amount {amount} is more than maximum purchase {maximum}")]
    AboveMaximum {
        /// Requested base units.
        amount: Amount,
        /// Configured maximum.
        maximum: Amount,
    },

    /// The attached payment is not exactly `amount * price`.
    #[error("incorrect payment: {received} does not match the price of {amount} units")]
    IncorrectPayment {
        /// Requested base units.
        amount: Amount,
        /// Native base units attached to the call.
        received: Amount,
    },

    /// Not enough units left, either under the sale ceiling or in the
    /// coordinator's ledger balance.
    #[error("insufficient supply: requested {requested}, available {available}")]
    InsufficientSupply {
        /// Requested base units.
        requested: Amount,
        /// Units that could still be sold.
        available: Amount,
    },

    /// The sale was finalized; no further purchases.
    #[error("sale has been finalized")]
    SaleFinalized,

    /// A price of zero was requested.
    #[error("price must be positive")]
    ZeroPrice,

    /// The creation parameters were rejected.
    #[error("invalid sale configuration: {0}")]
    Config(#[from] ConfigError),

    /// A ledger transfer failed; the call was rolled back.
    #[error("ledger transfer failed: {0}")]
    Ledger(#[from] LedgerError),
}

impl SaleError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SaleError::Unauthorized { .. } => "unauthorized",
            SaleError::NotStarted { .. } => "not_started",
            SaleError::BelowMinimum { .. } => "below_minimum",
            SaleError::AboveMaximum { .. } => "above_maximum",
            SaleError::IncorrectPayment { .. } => "incorrect_payment",
            SaleError::InsufficientSupply { .. } => "insufficient_supply",
            SaleError::SaleFinalized => "sale_finalized",
            SaleError::ZeroPrice => "zero_price",
            SaleError::Config(_) => "invalid_config",
            SaleError::Ledger(_) => "ledger_failure",
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Who is calling, what they attached, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The account submitting the call.
    pub caller: Address,
    /// Native base units attached as payment.
    pub value: Amount,
    /// The time the call executes at.
    pub timestamp: DateTime<Utc>,
}

impl CallContext {
    /// A call from `caller`, with no payment, executing now.
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: Amount::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a native payment.
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    /// Overrides the execution time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// What `finalize` moved to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Unsold units returned.
    pub units_returned: Amount,
    /// Native currency collected.
    pub native_collected: Amount,
}

/// Point-in-time view of a coordinator, for display and APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    pub address: Address,
    pub owner: Address,
    pub token: Address,
    pub gate: Address,
    pub price: Price,
    pub max_units: Amount,
    pub min_purchase: Amount,
    pub max_purchase: Amount,
    pub sale_start: DateTime<Utc>,
    pub units_sold: Amount,
    pub unit_balance: Amount,
    pub native_balance: Amount,
    pub finalized: bool,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A fixed-price, allow-listed token sale.
pub struct SaleCoordinator {
    address: Address,
    owner: Address,
    token: SharedLedger,
    token_address: Address,
    native: SharedLedger,
    gate: SharedGate,
    gate_address: Address,
    price: Price,
    max_units: Amount,
    min_purchase: Amount,
    max_purchase: Amount,
    sale_start: DateTime<Utc>,
    units_sold: Amount,
    finalized: bool,
    events: EventLog<SaleEvent>,
}

impl SaleCoordinator {
    /// Creates a coordinator at `address` owned by `owner`.
    ///
    /// The coordinator starts unfunded: the owner must transfer units to
    /// `address` in the unit ledger before anything can be sold.
    ///
    /// # Arguments
    ///
    /// * `token` - Ledger of the unit being sold.
    /// * `native` - Ledger of the payment currency.
    /// * `gate` - Allow-list consulted for every beneficiary.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Config`] if `config` fails validation.
    pub fn new(
        address: Address,
        owner: Address,
        config: SaleConfig,
        token: SharedLedger,
        native: SharedLedger,
        gate: SharedGate,
    ) -> Result<Self, SaleError> {
        config.validate()?;

        let token_address = token.lock().address();
        let gate_address = gate.read().address();
        tracing::info!(
            sale = %address,
            %owner,
            token = %token_address,
            gate = %gate_address,
            price = %config.price,
            max_units = %config.max_units.format_units(),
            "sale coordinator deployed"
        );

        Ok(Self {
            address,
            owner,
            token,
            token_address,
            native,
            gate,
            gate_address,
            price: config.price,
            max_units: config.max_units,
            min_purchase: config.min_purchase,
            max_purchase: config.max_purchase,
            sale_start: config.sale_start,
            units_sold: Amount::ZERO,
            finalized: false,
            events: EventLog::new(),
        })
    }

    /// Sells `amount` base units to `beneficiary` for `ctx.value`.
    ///
    /// The payment is debited from `ctx.caller` in the native ledger and
    /// retained by the coordinator.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// [`SaleError::SaleFinalized`], [`SaleError::NotStarted`],
    /// [`SaleError::Unauthorized`] (beneficiary not approved),
    /// [`SaleError::BelowMinimum`], [`SaleError::AboveMaximum`],
    /// [`SaleError::IncorrectPayment`], [`SaleError::InsufficientSupply`].
    /// A failing ledger transfer yields [`SaleError::Ledger`] after rollback.
    pub fn buy_tokens(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
        beneficiary: Address,
    ) -> Result<(), SaleError> {
        let new_units_sold = self.check_purchase(ctx, amount, &beneficiary).map_err(|e| {
            tracing::debug!(sale = %self.address, code = e.code(), %beneficiary, "purchase rejected");
            e
        })?;

        // Effects before interactions.
        let previous_units_sold = self.units_sold;
        self.units_sold = new_units_sold;

        if let Err(err) = self.settle_purchase(ctx, amount, &beneficiary) {
            self.units_sold = previous_units_sold;
            tracing::warn!(sale = %self.address, error = %err, "purchase rolled back");
            return Err(err.into());
        }

        self.events.emit(SaleEvent::Buy {
            amount,
            beneficiary,
        });
        tracing::info!(
            sale = %self.address,
            %beneficiary,
            amount = %amount.format_units(),
            units_sold = %self.units_sold.format_units(),
            "units sold"
        );
        Ok(())
    }

    /// Changes the price charged by subsequent purchases.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Unauthorized`] if `caller` is not the owner.
    /// Returns [`SaleError::ZeroPrice`] if `new_price` is zero.
    pub fn set_price(&mut self, caller: &Address, new_price: Price) -> Result<(), SaleError> {
        self.ensure_owner(caller)?;
        if new_price.is_zero() {
            return Err(SaleError::ZeroPrice);
        }

        let old_price = std::mem::replace(&mut self.price, new_price);
        self.events.emit(SaleEvent::PriceUpdated {
            old_price,
            new_price,
        });
        tracing::info!(sale = %self.address, %old_price, %new_price, "price updated");
        Ok(())
    }

    /// Sweeps the remaining unit balance and the native balance to the owner
    /// and closes the sale.
    ///
    /// Repeatable: a second call moves nothing and succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Unauthorized`] if `caller` is not the owner.
    /// A failing ledger transfer yields [`SaleError::Ledger`] after rollback.
    pub fn finalize(&mut self, caller: &Address) -> Result<Settlement, SaleError> {
        self.ensure_owner(caller)?;

        let units_returned = self.unit_balance();
        let native_collected = self.native_balance();

        self.token
            .lock()
            .transfer(&self.address, &self.owner, units_returned)?;

        let paid_out = self
            .native
            .lock()
            .transfer(&self.address, &self.owner, native_collected);
        if let Err(err) = paid_out {
            let restored = self
                .token
                .lock()
                .transfer(&self.owner, &self.address, units_returned);
            if let Err(restore_err) = restored {
                tracing::error!(sale = %self.address, error = %restore_err, "failed to restore swept units");
            }
            tracing::warn!(sale = %self.address, error = %err, "finalize rolled back");
            return Err(err.into());
        }

        self.finalized = true;
        self.events.emit(SaleEvent::Finalize {
            units_sold: self.units_sold,
            native_collected,
        });
        tracing::info!(
            sale = %self.address,
            units_sold = %self.units_sold.format_units(),
            units_returned = %units_returned.format_units(),
            native_collected = %native_collected.format_units(),
            "sale finalized"
        );

        Ok(Settlement {
            units_returned,
            native_collected,
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn max_units(&self) -> Amount {
        self.max_units
    }

    pub fn units_sold(&self) -> Amount {
        self.units_sold
    }

    pub fn minimum_purchase(&self) -> Amount {
        self.min_purchase
    }

    pub fn maximum_purchase(&self) -> Amount {
        self.max_purchase
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.sale_start
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Address of the unit ledger.
    pub fn unit_source_address(&self) -> Address {
        self.token_address
    }

    pub fn gate_address(&self) -> Address {
        self.gate_address
    }

    /// The coordinator's own account in both ledgers.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Units the coordinator currently holds.
    pub fn unit_balance(&self) -> Amount {
        self.token.lock().balance_of(&self.address)
    }

    /// Native currency collected and not yet swept.
    pub fn native_balance(&self) -> Amount {
        self.native.lock().balance_of(&self.address)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The exact payment `buy_tokens` expects for `amount`, or `None` if no
    /// payment can match (overflow, or a fraction of a native base unit).
    pub fn quote(&self, amount: Amount) -> Option<Amount> {
        self.price.quote(amount)
    }

    pub fn events(&self) -> &EventLog<SaleEvent> {
        &self.events
    }

    pub fn snapshot(&self) -> SaleSnapshot {
        SaleSnapshot {
            address: self.address,
            owner: self.owner,
            token: self.token_address,
            gate: self.gate_address,
            price: self.price,
            max_units: self.max_units,
            min_purchase: self.min_purchase,
            max_purchase: self.max_purchase,
            sale_start: self.sale_start,
            units_sold: self.units_sold,
            unit_balance: self.unit_balance(),
            native_balance: self.native_balance(),
            finalized: self.finalized,
        }
    }

    // -- Internals ----------------------------------------------------------

    fn ensure_owner(&self, caller: &Address) -> Result<(), SaleError> {
        if *caller != self.owner {
            tracing::debug!(sale = %self.address, %caller, "rejected non-owner call");
            return Err(SaleError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    /// Runs every purchase precondition. Returns the new `units_sold`.
    fn check_purchase(
        &self,
        ctx: &CallContext,
        amount: Amount,
        beneficiary: &Address,
    ) -> Result<Amount, SaleError> {
        if self.finalized {
            return Err(SaleError::SaleFinalized);
        }
        if ctx.timestamp < self.sale_start {
            return Err(SaleError::NotStarted {
                start: self.sale_start,
            });
        }
        if !self.gate.read().is_approved(beneficiary) {
            return Err(SaleError::Unauthorized {
                caller: *beneficiary,
            });
        }
        if amount < self.min_purchase {
            return Err(SaleError::BelowMinimum {
                amount,
                minimum: self.min_purchase,
            });
        }
        if amount > self.max_purchase {
            return Err(SaleError::AboveMaximum {
                amount,
                maximum: self.max_purchase,
            });
        }
        if self.price.quote(amount) != Some(ctx.value) {
            return Err(SaleError::IncorrectPayment {
                amount,
                received: ctx.value,
            });
        }

        let new_units_sold = match self.units_sold.checked_add(amount) {
            Some(total) if total <= self.max_units => total,
            _ => {
                return Err(SaleError::InsufficientSupply {
                    requested: amount,
                    available: self.max_units.saturating_sub(self.units_sold),
                })
            }
        };
        let balance = self.unit_balance();
        if balance < amount {
            return Err(SaleError::InsufficientSupply {
                requested: amount,
                available: balance,
            });
        }

        Ok(new_units_sold)
    }

    /// Collects the payment, then delivers the units. Refunds the payment if
    /// delivery fails.
    fn settle_purchase(
        &self,
        ctx: &CallContext,
        amount: Amount,
        beneficiary: &Address,
    ) -> Result<(), LedgerError> {
        self.native
            .lock()
            .transfer(&ctx.caller, &self.address, ctx.value)?;

        let delivered = self
            .token
            .lock()
            .transfer(&self.address, beneficiary, amount);
        if let Err(err) = delivered {
            let refunded = self
                .native
                .lock()
                .transfer(&self.address, &ctx.caller, ctx.value);
            if let Err(refund_err) = refunded {
                tracing::error!(sale = %self.address, error = %refund_err, "failed to refund payment");
            }
            return Err(err);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SaleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleCoordinator")
            .field("address", &self.address)
            .field("owner", &self.owner)
            .field("token", &self.token_address)
            .field("gate", &self.gate_address)
            .field("price", &self.price)
            .field("units_sold", &self.units_sold)
            .field("finalized", &self.finalized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_gate::AccessGate;
    use crate::ledger::{InMemoryLedger, TokenMetadata};
    use chrono::Duration;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const OWNER: Address = Address::repeat_byte(0x01);
    const BUYER: Address = Address::repeat_byte(0x02);
    const SALE: Address = Address::repeat_byte(0x5a);

    struct Fixture {
        sale: SaleCoordinator,
        token: Arc<Mutex<InMemoryLedger>>,
        native: Arc<Mutex<InMemoryLedger>>,
    }

    fn fixture(config: SaleConfig, funding: Amount) -> Fixture {
        let metadata = TokenMetadata {
            name: "Test".into(),
            symbol: "TST".into(),
            decimals: 18,
        };
        let token = InMemoryLedger::deploy(
            Address::repeat_byte(0x70),
            metadata,
            Amount::from_units(1_000_000),
            OWNER,
        )
        .into_shared();
        let native = InMemoryLedger::native(Address::ZERO).into_shared();
        native
            .lock()
            .credit(&BUYER, Amount::from_units(1_000))
            .unwrap();

        let mut gate = AccessGate::new(Address::repeat_byte(0x9a), OWNER);
        gate.add_address(&OWNER, BUYER).unwrap();

        let sale = SaleCoordinator::new(
            SALE,
            OWNER,
            config,
            token.clone(),
            native.clone(),
            gate.into_shared(),
        )
        .unwrap();
        token.lock().transfer(&OWNER, &SALE, funding).unwrap();

        Fixture {
            sale,
            token,
            native,
        }
    }

    fn config() -> SaleConfig {
        SaleConfig {
            price: Price::from_whole(1),
            max_units: Amount::from_units(1_000_000),
            min_purchase: Amount::from_units(10),
            max_purchase: Amount::from_units(100),
            sale_start: Utc::now() - Duration::days(1),
        }
    }

    fn buy(f: &mut Fixture, amount: u64, value: u64) -> Result<(), SaleError> {
        let ctx = CallContext::new(BUYER).with_value(Amount::from_units(value));
        f.sale.buy_tokens(&ctx, Amount::from_units(amount), BUYER)
    }

    /// A ledger that accepts balance queries but refuses every transfer.
    struct FrozenLedger {
        inner: InMemoryLedger,
    }

    impl TokenLedger for FrozenLedger {
        fn address(&self) -> Address {
            self.inner.address()
        }

        fn balance_of(&self, holder: &Address) -> Amount {
            self.inner.balance_of(holder)
        }

        fn transfer(
            &mut self,
            from: &Address,
            _to: &Address,
            amount: Amount,
        ) -> Result<(), LedgerError> {
            Err(LedgerError::InsufficientBalance {
                holder: *from,
                balance: Amount::ZERO,
                amount,
            })
        }
    }

    #[test]
    fn invalid_config_rejected_at_creation() {
        let token = InMemoryLedger::native(Address::repeat_byte(0x70)).into_shared();
        let native = InMemoryLedger::native(Address::ZERO).into_shared();
        let gate = AccessGate::new(Address::repeat_byte(0x9a), OWNER).into_shared();
        let bad = SaleConfig {
            price: Price::default(),
            ..config()
        };
        let err = SaleCoordinator::new(SALE, OWNER, bad, token, native, gate).unwrap_err();
        assert_eq!(err, SaleError::Config(ConfigError::ZeroPrice));
    }

    #[test]
    fn accessors_reflect_creation_parameters() {
        let f = fixture(config(), Amount::from_units(1_000_000));
        assert_eq!(f.sale.price(), Price::from_whole(1));
        assert_eq!(f.sale.max_units(), Amount::from_units(1_000_000));
        assert_eq!(f.sale.minimum_purchase(), Amount::from_units(10));
        assert_eq!(f.sale.maximum_purchase(), Amount::from_units(100));
        assert_eq!(f.sale.owner(), OWNER);
        assert_eq!(f.sale.unit_source_address(), Address::repeat_byte(0x70));
        assert_eq!(f.sale.gate_address(), Address::repeat_byte(0x9a));
        assert_eq!(f.sale.units_sold(), Amount::ZERO);
        assert_eq!(f.sale.unit_balance(), Amount::from_units(1_000_000));
        assert!(!f.sale.is_finalized());
    }

    #[test]
    fn successful_purchase_updates_all_balances() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        buy(&mut f, 10, 10).unwrap();

        assert_eq!(f.sale.units_sold(), Amount::from_units(10));
        assert_eq!(f.token.lock().balance_of(&BUYER), Amount::from_units(10));
        assert_eq!(f.sale.unit_balance(), Amount::from_units(999_990));
        assert_eq!(f.sale.native_balance(), Amount::from_units(10));
        assert_eq!(f.native.lock().balance_of(&BUYER), Amount::from_units(990));
        assert_eq!(
            f.sale.events().last(),
            Some(&SaleEvent::Buy {
                amount: Amount::from_units(10),
                beneficiary: BUYER,
            })
        );
    }

    #[test]
    fn purchase_checks_run_in_documented_order() {
        // Not started, and the payment is also wrong: NotStarted wins.
        let mut f = fixture(
            SaleConfig {
                sale_start: Utc::now() + Duration::days(1),
                ..config()
            },
            Amount::from_units(1_000_000),
        );
        assert_eq!(buy(&mut f, 10, 5).unwrap_err().code(), "not_started");

        // Below minimum with wrong payment: BelowMinimum wins.
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        assert_eq!(buy(&mut f, 5, 1).unwrap_err().code(), "below_minimum");
        assert_eq!(buy(&mut f, 101, 101).unwrap_err().code(), "above_maximum");
        assert_eq!(buy(&mut f, 10, 5).unwrap_err().code(), "incorrect_payment");
    }

    #[test]
    fn sale_ceiling_is_enforced() {
        let mut f = fixture(
            SaleConfig {
                max_units: Amount::from_units(150),
                ..config()
            },
            Amount::from_units(1_000),
        );
        buy(&mut f, 100, 100).unwrap();
        let err = buy(&mut f, 60, 60).unwrap_err();
        assert_eq!(
            err,
            SaleError::InsufficientSupply {
                requested: Amount::from_units(60),
                available: Amount::from_units(50),
            }
        );
        buy(&mut f, 50, 50).unwrap();
        assert_eq!(f.sale.units_sold(), f.sale.max_units());
    }

    #[test]
    fn counter_overflow_reports_insufficient_supply() {
        let unbounded = SaleConfig {
            max_units: Amount::from_u256(ethnum::U256::MAX),
            ..config()
        };
        let mut f = fixture(unbounded, Amount::from_units(1_000_000));
        f.sale.units_sold = Amount::from_u256(ethnum::U256::MAX);

        let err = buy(&mut f, 10, 10).unwrap_err();
        assert_eq!(
            err,
            SaleError::InsufficientSupply {
                requested: Amount::from_units(10),
                available: Amount::ZERO,
            }
        );
        assert_eq!(f.sale.units_sold(), Amount::from_u256(ethnum::U256::MAX));
    }

    #[test]
    fn unfunded_sale_reports_insufficient_supply() {
        let mut f = fixture(config(), Amount::from_units(5));
        let err = buy(&mut f, 10, 10).unwrap_err();
        assert_eq!(
            err,
            SaleError::InsufficientSupply {
                requested: Amount::from_units(10),
                available: Amount::from_units(5),
            }
        );
        assert_eq!(f.sale.units_sold(), Amount::ZERO);
    }

    #[test]
    fn payer_without_funds_is_rolled_back() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        let broke = Address::repeat_byte(0x0b);
        let ctx = CallContext::new(broke).with_value(Amount::from_units(10));

        let err = f
            .sale
            .buy_tokens(&ctx, Amount::from_units(10), BUYER)
            .unwrap_err();
        assert_eq!(err.code(), "ledger_failure");
        assert_eq!(f.sale.units_sold(), Amount::ZERO);
        assert_eq!(f.sale.unit_balance(), Amount::from_units(1_000_000));
        assert!(f.sale.events().is_empty());
    }

    #[test]
    fn failed_delivery_refunds_payment_and_restores_counter() {
        let mut inner = InMemoryLedger::native(Address::repeat_byte(0x70));
        inner.credit(&SALE, Amount::from_units(1_000)).unwrap();
        let frozen: SharedLedger = Arc::new(Mutex::new(FrozenLedger { inner }));

        let native = InMemoryLedger::native(Address::ZERO).into_shared();
        native
            .lock()
            .credit(&BUYER, Amount::from_units(100))
            .unwrap();
        let mut gate = AccessGate::new(Address::repeat_byte(0x9a), OWNER);
        gate.add_address(&OWNER, BUYER).unwrap();

        let mut sale = SaleCoordinator::new(
            SALE,
            OWNER,
            config(),
            frozen,
            native.clone(),
            gate.into_shared(),
        )
        .unwrap();

        let ctx = CallContext::new(BUYER).with_value(Amount::from_units(10));
        let err = sale
            .buy_tokens(&ctx, Amount::from_units(10), BUYER)
            .unwrap_err();
        assert!(matches!(err, SaleError::Ledger(_)));
        assert_eq!(sale.units_sold(), Amount::ZERO);
        assert_eq!(sale.native_balance(), Amount::ZERO);
        assert_eq!(native.lock().balance_of(&BUYER), Amount::from_units(100));
        assert!(sale.events().is_empty());
    }

    #[test]
    fn failed_native_sweep_restores_units() {
        let token = InMemoryLedger::deploy(
            Address::repeat_byte(0x70),
            TokenMetadata {
                name: "Test".into(),
                symbol: "TST".into(),
                decimals: 18,
            },
            Amount::from_units(500),
            OWNER,
        )
        .into_shared();
        let inner = InMemoryLedger::native(Address::ZERO);
        let frozen: SharedLedger = Arc::new(Mutex::new(FrozenLedger { inner }));
        let gate = AccessGate::new(Address::repeat_byte(0x9a), OWNER).into_shared();

        let mut sale =
            SaleCoordinator::new(SALE, OWNER, config(), token.clone(), frozen, gate).unwrap();
        token
            .lock()
            .transfer(&OWNER, &SALE, Amount::from_units(500))
            .unwrap();

        let err = sale.finalize(&OWNER).unwrap_err();
        assert_eq!(err.code(), "ledger_failure");
        assert_eq!(sale.unit_balance(), Amount::from_units(500));
        let owner_units = token.lock().balance_of(&OWNER);
        assert_eq!(owner_units, Amount::ZERO);
        assert!(!sale.is_finalized());
        assert!(sale.events().is_empty());
    }

    #[test]
    fn set_price_by_owner_reprices_purchases() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        f.sale.set_price(&OWNER, Price::from_whole(2)).unwrap();
        assert_eq!(f.sale.price(), Price::from_whole(2));
        assert_eq!(
            f.sale.quote(Amount::from_units(10)),
            Some(Amount::from_units(20))
        );

        assert_eq!(buy(&mut f, 10, 10).unwrap_err().code(), "incorrect_payment");
        buy(&mut f, 10, 20).unwrap();
    }

    #[test]
    fn set_price_rejects_non_owner_and_zero() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        assert_eq!(
            f.sale.set_price(&BUYER, Price::from_whole(2)),
            Err(SaleError::Unauthorized { caller: BUYER })
        );
        assert_eq!(
            f.sale.set_price(&OWNER, Price::default()),
            Err(SaleError::ZeroPrice)
        );
        assert_eq!(f.sale.price(), Price::from_whole(1));
        assert!(f.sale.events().is_empty());
    }

    #[test]
    fn finalize_sweeps_and_closes() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        buy(&mut f, 10, 10).unwrap();

        let settlement = f.sale.finalize(&OWNER).unwrap();
        assert_eq!(
            settlement,
            Settlement {
                units_returned: Amount::from_units(999_990),
                native_collected: Amount::from_units(10),
            }
        );
        assert_eq!(f.sale.unit_balance(), Amount::ZERO);
        assert_eq!(f.sale.native_balance(), Amount::ZERO);
        assert_eq!(f.token.lock().balance_of(&OWNER), Amount::from_units(999_990));
        assert_eq!(f.native.lock().balance_of(&OWNER), Amount::from_units(10));
        assert!(f.sale.is_finalized());

        assert_eq!(buy(&mut f, 10, 10).unwrap_err(), SaleError::SaleFinalized);
    }

    #[test]
    fn finalize_twice_moves_nothing() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        f.sale.finalize(&OWNER).unwrap();
        let second = f.sale.finalize(&OWNER).unwrap();
        assert_eq!(second.units_returned, Amount::ZERO);
        assert_eq!(second.native_collected, Amount::ZERO);
        assert_eq!(f.sale.events().len(), 2);
    }

    #[test]
    fn finalize_by_non_owner_changes_nothing() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        buy(&mut f, 10, 10).unwrap();
        let err = f.sale.finalize(&BUYER).unwrap_err();
        assert_eq!(err.code(), "unauthorized");
        assert_eq!(f.sale.unit_balance(), Amount::from_units(999_990));
        assert_eq!(f.sale.native_balance(), Amount::from_units(10));
        assert!(!f.sale.is_finalized());
    }

    #[test]
    fn snapshot_matches_accessors() {
        let mut f = fixture(config(), Amount::from_units(1_000_000));
        buy(&mut f, 10, 10).unwrap();
        let snap = f.sale.snapshot();
        assert_eq!(snap.units_sold, f.sale.units_sold());
        assert_eq!(snap.unit_balance, Amount::from_units(999_990));
        assert_eq!(snap.native_balance, Amount::from_units(10));
        assert_eq!(snap.price, f.sale.price());
        assert!(!snap.finalized);
    }
}
