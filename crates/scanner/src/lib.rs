//! Asset scanning workflow of an opname session.
//!
//! [`Scanner`] drives the reconciliation state in `opname-core` through a
//! remote [`opname_client::OpnameBackend`], mirrors progress into the local
//! [`opname_store::StateStore`], and reports every outcome the user should
//! see as a [`Notice`] on a broadcast channel.

pub mod error;
pub mod notice;
pub mod scanner;

pub use error::ScanError;
pub use notice::{drain_notices, Notice, NoticeLevel};
pub use scanner::{RemovalOutcome, Scanner};
