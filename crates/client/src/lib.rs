//! HTTP client for the remote opname API.
//!
//! [`api::OpnameApi`] wraps every endpoint the scanning workflow uses;
//! [`dto`] holds the snake_case wire types and their conversions to the
//! domain types of `opname-core`; [`backend::OpnameBackend`] is the seam
//! the workflow layer depends on.

pub mod api;
pub mod backend;
pub mod dto;

pub use api::{ApiError, OpnameApi};
pub use backend::OpnameBackend;
