// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Crowdsale Contracts
//!
//! Contract logic for an allow-listed token sale:
//!
//! - **Access Gate**: administrator-managed allow-list of addresses that may
//!   receive units from the sale.
//! - **Sale Coordinator**: fixed-price sale of a pre-funded pool of units,
//!   with per-transaction bounds, a cumulative ceiling, a start time, and an
//!   owner-triggered finalization that sweeps units and proceeds.
//! - **Token Ledger**: the balance-store seam both contracts talk through,
//!   with an in-memory reference implementation.
//!
//! ## Design Principles
//!
//! 1. All monetary arithmetic is checked 256-bit integer math on an
//!    18-decimal fixed-point scale. No floats, no wrapping.
//! 2. A failed call changes nothing: every precondition is checked before
//!    the first mutation, and ledger failures roll back what came before.
//! 3. Privileged calls compare an explicit caller identity against the
//!    stored owner or administrator.
//! 4. Every error carries a stable machine-readable code.

pub mod access_gate;
pub mod address;
pub mod amount;
pub mod config;
pub mod deployment;
pub mod events;
pub mod ledger;
pub mod sale_coordinator;

pub use access_gate::{AccessGate, GateError, SharedGate};
pub use address::Address;
pub use amount::{Amount, Price};
pub use config::SaleConfig;
pub use deployment::{Deployment, DeploymentConfig};
pub use events::{EventLog, GateEvent, LedgerEvent, SaleEvent};
pub use ledger::{InMemoryLedger, LedgerError, SharedLedger, TokenLedger};
pub use sale_coordinator::{CallContext, SaleCoordinator, SaleError, SaleSnapshot, Settlement};
