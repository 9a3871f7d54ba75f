//! # ebb-core
//! Foundation types and traits for the Ebb vote-escrow ledger.

pub mod constants;
pub mod error;
pub mod memory;
pub mod traits;
pub mod types;
