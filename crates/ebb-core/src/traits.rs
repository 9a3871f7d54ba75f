//! Trait interfaces for the ledger's external collaborators.
//!
//! - [`ChainClock`]: current time and block ordinal
//! - [`AssetVault`]: custody of the underlying locked asset
//!
//! Both are injected into the ledger so its replay and interpolation logic
//! runs without a live chain underneath.

use crate::error::AssetError;
use crate::types::Address;

/// Source of "now" for a ledger operation.
///
/// Both values must be non-decreasing across calls. The ledger samples them
/// once per operation.
pub trait ChainClock {
    /// Current timestamp in seconds.
    fn timestamp(&self) -> u64;

    /// Current block number.
    fn block_number(&self) -> u64;
}

/// Custody of the underlying asset held by the ledger.
///
/// Every call either moves the full amount or fails without effect.
pub trait AssetVault {
    /// Move `amount` from `from` into escrow.
    fn transfer_from(&mut self, from: &Address, amount: u128) -> Result<(), AssetError>;

    /// Release `amount` from escrow to `to`.
    fn transfer(&mut self, to: &Address, amount: u128) -> Result<(), AssetError>;

    /// Amount currently held in escrow.
    fn escrowed(&self) -> u128;
}
