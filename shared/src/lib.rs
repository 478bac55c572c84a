//! Shared types and models for the TBS (palm fruit) trading platform
//!
//! This crate holds the workflow rules shared between the backend and the
//! browser helpers (via WASM): stock ledger arithmetic, the purchase order
//! lifecycle, pickup scheduling, two-phase weighbridge recording, document
//! issuance and payment verification.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
