//! In-memory collaborator implementations.
//!
//! [`ManualClock`] is a clock advanced explicitly by the caller, producing
//! blocks at a fixed cadence. [`MemoryVault`] is a `HashMap`-backed token
//! balance sheet with an escrow account. Both are suitable for tests and
//! simulation; neither persists anything.

use std::collections::HashMap;

use crate::error::AssetError;
use crate::traits::{AssetVault, ChainClock};
use crate::types::Address;

/// A manually driven chain clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManualClock {
    timestamp: u64,
    block: u64,
    /// Seconds per block when advancing time.
    block_time: u64,
}

impl ManualClock {
    /// Create a clock at the given time and block, mining one block every
    /// `block_time` seconds (clamped to at least one second).
    pub fn new(timestamp: u64, block: u64, block_time: u64) -> Self {
        Self { timestamp, block, block_time: block_time.max(1) }
    }

    /// Advance time by `secs`, mining `secs / block_time` blocks.
    pub fn advance(&mut self, secs: u64) {
        self.timestamp = self.timestamp.saturating_add(secs);
        self.block = self.block.saturating_add(secs / self.block_time);
    }

    /// Jump to `timestamp`, mining blocks for the elapsed interval.
    ///
    /// Timestamps in the past are ignored.
    pub fn advance_to(&mut self, timestamp: u64) {
        if timestamp > self.timestamp {
            self.advance(timestamp - self.timestamp);
        }
    }

    /// Mine `n` blocks without moving time.
    pub fn mine(&mut self, n: u64) {
        self.block = self.block.saturating_add(n);
    }

    /// Seconds per block.
    pub fn block_time(&self) -> u64 {
        self.block_time
    }
}

impl ChainClock for ManualClock {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn block_number(&self) -> u64 {
        self.block
    }
}

/// An in-memory token ledger with a single escrow account.
#[derive(Clone, Debug, Default)]
pub struct MemoryVault {
    balances: HashMap<Address, u128>,
    escrow: u128,
}

impl MemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` out of thin air.
    pub fn mint(&mut self, account: Address, amount: u128) -> Result<(), AssetError> {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(AssetError::Overflow)?;
        Ok(())
    }

    /// Free (non-escrowed) balance of `account`.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }
}

impl AssetVault for MemoryVault {
    fn transfer_from(&mut self, from: &Address, amount: u128) -> Result<(), AssetError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(AssetError::InsufficientBalance { account: *from, have, need: amount });
        }
        let escrow = self.escrow.checked_add(amount).ok_or(AssetError::Overflow)?;
        self.balances.insert(*from, have - amount);
        self.escrow = escrow;
        Ok(())
    }

    fn transfer(&mut self, to: &Address, amount: u128) -> Result<(), AssetError> {
        if self.escrow < amount {
            return Err(AssetError::InsufficientEscrow { have: self.escrow, need: amount });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        self.escrow -= amount;
        self.balances.insert(*to, credited);
        Ok(())
    }

    fn escrowed(&self) -> u128 {
        self.escrow
    }
}
