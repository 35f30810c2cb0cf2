//! Domain logic for the stock opname client.
//!
//! Everything in this crate is pure and synchronous: asset records, the
//! equipment string rules, reconciliation entries and their change-sets,
//! the scan-session entry list, and the opname session lifecycle. I/O lives
//! in `opname-client`, `opname-store` and `opname-scanner`.

pub mod asset;
pub mod directory;
pub mod equipment;
pub mod error;
pub mod reconciliation;
pub mod scan_session;
pub mod session;
pub mod types;
pub mod validation;
