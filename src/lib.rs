//! Fixed-supply fungible token ledger.
//!
//! Keeps ownership balances and delegated-spending allowances for a single
//! asset in an ordered key-value store supplied by the host. Mutations are
//! gated by host-verified witnesses and emit transfer/approval records
//! through an event sink. The `ledger` module holds the state machine,
//! `store` the storage port, and `dispatch` the operation table a host
//! routes calls through.

pub mod dispatch;
pub mod ledger;
pub mod store;
