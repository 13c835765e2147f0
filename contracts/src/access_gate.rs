//! # Access Gate Contract
//!
//! The allow-list consulted by the sale coordinator before every purchase.
//! A single administrator, fixed at creation, adds and removes addresses;
//! anyone may ask whether an address is approved.
//!
//! ## Guarantees
//!
//! - **Administrator gating**: `add_address` and `remove_address` compare the
//!   caller against the stored administrator before touching the set.
//! - **No silent no-ops**: adding a member or removing a non-member is an
//!   error, never a quiet success.
//! - **Atomicity**: a membership change and its event are recorded together,
//!   or not at all.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::address::Address;
use crate::events::{EventLog, GateEvent};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during allow-list administration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The caller is not the administrator.
    #[error("unauthorized: only the administrator can call this function")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },

    /// The address is already on the allow-list.
    #[error("address is already approved: {0}")]
    AlreadyApproved(Address),

    /// The address is not on the allow-list.
    #[error("address is not approved: {0}")]
    NotApproved(Address),
}

impl GateError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Unauthorized { .. } => "unauthorized",
            GateError::AlreadyApproved(_) => "already_approved",
            GateError::NotApproved(_) => "not_approved",
        }
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// An access gate shared with the sale coordinators that consult it.
pub type SharedGate = Arc<RwLock<AccessGate>>;

/// Administrator-managed set of approved addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGate {
    address: Address,
    administrator: Address,
    approved: HashSet<Address>,
    events: EventLog<GateEvent>,
}

impl AccessGate {
    /// Creates an empty allow-list administered by `administrator`.
    pub fn new(address: Address, administrator: Address) -> Self {
        tracing::info!(gate = %address, %administrator, "access gate deployed");
        Self {
            address,
            administrator,
            approved: HashSet::new(),
            events: EventLog::new(),
        }
    }

    /// Wraps the gate for sharing with sale coordinators.
    pub fn into_shared(self) -> SharedGate {
        Arc::new(RwLock::new(self))
    }

    /// Approves `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] if `caller` is not the administrator.
    /// Returns [`GateError::AlreadyApproved`] if `addr` is already a member.
    pub fn add_address(&mut self, caller: &Address, addr: Address) -> Result<(), GateError> {
        self.ensure_administrator(caller)?;
        if !self.approved.insert(addr) {
            return Err(GateError::AlreadyApproved(addr));
        }

        self.events.emit(GateEvent::AddressAdded { address: addr });
        tracing::info!(gate = %self.address, address = %addr, "address approved");
        Ok(())
    }

    /// Revokes `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] if `caller` is not the administrator.
    /// Returns [`GateError::NotApproved`] if `addr` is not a member.
    pub fn remove_address(&mut self, caller: &Address, addr: Address) -> Result<(), GateError> {
        self.ensure_administrator(caller)?;
        if !self.approved.remove(&addr) {
            return Err(GateError::NotApproved(addr));
        }

        self.events.emit(GateEvent::AddressRemoved { address: addr });
        tracing::info!(gate = %self.address, address = %addr, "address revoked");
        Ok(())
    }

    /// Whether `addr` may buy.
    pub fn is_approved(&self, addr: &Address) -> bool {
        self.approved.contains(addr)
    }

    pub fn administrator(&self) -> Address {
        self.administrator
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn approved_count(&self) -> usize {
        self.approved.len()
    }

    pub fn events(&self) -> &EventLog<GateEvent> {
        &self.events
    }

    fn ensure_administrator(&self, caller: &Address) -> Result<(), GateError> {
        if *caller != self.administrator {
            tracing::debug!(gate = %self.address, %caller, "rejected non-administrator call");
            return Err(GateError::Unauthorized { caller: *caller });
        }
        Ok(())
    }
}
