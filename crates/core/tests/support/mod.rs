//! Shared test helpers for `shopsync-core` integration tests.
//!
//! These helpers provide a scripted remote store and payload builders so the
//! scenario tests can focus on queue behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod remote;

use serde_json::{json, Value};
use shopsync_domain::Payload;

/// Build a payload from a JSON object literal.
pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("payload must be a JSON object")
}

/// Ticket payload with a customer name, the shape most scenarios use.
pub fn ticket(customer: &str) -> Payload {
    payload(json!({ "customer": customer, "device": "iPhone 12", "status": "intake" }))
}
