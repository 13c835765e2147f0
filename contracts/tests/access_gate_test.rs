//! Integration tests for the access gate: administration rules and how
//! rejected calls leave the allow-list untouched.

use crowdsale_contracts::{AccessGate, Address, GateError, GateEvent};

const OWNER: Address = Address::repeat_byte(0x0a);
const ADDR1: Address = Address::repeat_byte(0x01);
const ADDR2: Address = Address::repeat_byte(0x02);

fn gate() -> AccessGate {
    AccessGate::new(Address::derive(&OWNER, 0), OWNER)
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[test]
fn creator_is_administrator() {
    assert_eq!(gate().administrator(), OWNER);
}

// ---------------------------------------------------------------------------
// Adding and Removing
// ---------------------------------------------------------------------------

#[test]
fn added_address_is_approved() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    assert!(gate.is_approved(&ADDR1));
}

#[test]
fn adding_emits_address_added() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    assert_eq!(
        gate.events().last(),
        Some(&GateEvent::AddressAdded { address: ADDR1 })
    );
}

#[test]
fn removed_address_is_not_approved() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    gate.remove_address(&OWNER, ADDR1).unwrap();
    assert!(!gate.is_approved(&ADDR1));
}

#[test]
fn removing_emits_address_removed() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    gate.remove_address(&OWNER, ADDR1).unwrap();
    assert_eq!(
        gate.events().last(),
        Some(&GateEvent::AddressRemoved { address: ADDR1 })
    );
}

#[test]
fn membership_is_independent_per_address() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    gate.add_address(&OWNER, ADDR2).unwrap();
    gate.remove_address(&OWNER, ADDR1).unwrap();
    assert!(!gate.is_approved(&ADDR1));
    assert!(gate.is_approved(&ADDR2));
    assert_eq!(gate.approved_count(), 1);
}

#[test]
fn re_adding_after_removal_is_allowed() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    gate.remove_address(&OWNER, ADDR1).unwrap();
    gate.add_address(&OWNER, ADDR1).unwrap();
    assert!(gate.is_approved(&ADDR1));
    assert_eq!(gate.events().len(), 3);
}

// ---------------------------------------------------------------------------
// Protection
// ---------------------------------------------------------------------------

#[test]
fn non_administrator_cannot_add() {
    let mut gate = gate();
    let err = gate.add_address(&ADDR1, ADDR2).unwrap_err();
    assert_eq!(err, GateError::Unauthorized { caller: ADDR1 });
    assert!(!gate.is_approved(&ADDR2));
}

#[test]
fn non_administrator_cannot_remove() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    let err = gate.remove_address(&ADDR1, ADDR1).unwrap_err();
    assert_eq!(err.code(), "unauthorized");
    assert!(gate.is_approved(&ADDR1));
}

#[test]
fn duplicate_add_rejected() {
    let mut gate = gate();
    gate.add_address(&OWNER, ADDR1).unwrap();
    let err = gate.add_address(&OWNER, ADDR1).unwrap_err();
    assert_eq!(err.code(), "already_approved");
    assert_eq!(gate.approved_count(), 1);
}

#[test]
fn removing_non_member_rejected() {
    let mut gate = gate();
    let err = gate.remove_address(&OWNER, ADDR1).unwrap_err();
    assert_eq!(err.code(), "not_approved");
}

#[test]
fn failed_calls_emit_nothing() {
    let mut gate = gate();
    let _ = gate.add_address(&ADDR1, ADDR2);
    let _ = gate.remove_address(&OWNER, ADDR1);
    assert!(gate.events().is_empty());
}

#[test]
fn error_messages_are_distinct() {
    let messages = [
        GateError::Unauthorized { caller: ADDR1 }.to_string(),
        GateError::AlreadyApproved(ADDR1).to_string(),
        GateError::NotApproved(ADDR1).to_string(),
    ];
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);
    assert_ne!(messages[0], messages[2]);
}
