//! # Contract Event Logs
//!
//! Each contract keeps its own ordered, append-only log of the records it
//! emitted. Entries are never rewritten or removed; an operation that fails
//! appends nothing.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::{Amount, Price};

/// Append-only, ordered event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog<E> {
    entries: Vec<E>,
}

impl<E> EventLog<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a record.
    pub(crate) fn emit(&mut self, event: E) {
        self.entries.push(event);
    }

    /// All records, oldest first.
    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    /// Records appended at or after position `cursor`.
    ///
    /// Lets a consumer poll for new records without re-reading the log.
    pub fn since(&self, cursor: usize) -> &[E] {
        self.entries.get(cursor..).unwrap_or(&[])
    }

    /// The most recent record, if any.
    pub fn last(&self) -> Option<&E> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Records emitted by the access gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateEvent {
    /// An address joined the allow-list.
    AddressAdded { address: Address },
    /// An address left the allow-list.
    AddressRemoved { address: Address },
}

/// Records emitted by the sale coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleEvent {
    /// `amount` base units were sold and delivered to `beneficiary`.
    Buy { amount: Amount, beneficiary: Address },
    /// The owner changed the price.
    PriceUpdated { old_price: Price, new_price: Price },
    /// The owner swept the sale. `native_collected` is the coordinator's
    /// native balance at the moment of the call.
    Finalize {
        units_sold: Amount,
        native_collected: Amount,
    },
}

/// Records emitted by a token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Balance moved between two holders. `from` is [`Address::ZERO`] for
    /// newly created supply.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
}
