//! Per-module clients.
//!
//! Each ledger module gets a typed action enum, the three call shapes
//! (`payload` / `tx` / `send`) delegating to the shared pipeline in
//! [`crate::action`], and read accessors over the query surface.

pub mod accumulator;
pub mod attest;
pub mod blob;
pub mod did;
pub mod offchain_signatures;
pub mod status_list_credential;
pub mod trust_registry;
