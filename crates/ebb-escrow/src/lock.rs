//! Per-account lock records and their legal transitions.
//!
//! The store never touches the checkpoint logs. Each `plan_*` method
//! validates a transition against the current record and returns the record
//! that would replace it; the caller commits it with [`LockStore::set`] once
//! the rest of the operation has succeeded.

use std::collections::HashMap;

use ebb_core::constants::{MAXTIME, round_to_week};
use ebb_core::error::{LedgerError, LockStateError, TimeOrderingError};
use ebb_core::types::{Address, LockedBalance};

/// Lifecycle state of an account's lock at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    /// Nothing held (never locked, or withdrawn).
    NoLock,
    /// Held and before its unlock time.
    Active,
    /// Held and at or past its unlock time, awaiting withdrawal.
    Expired,
}

/// Current lock record per account.
#[derive(Clone, Debug)]
pub struct LockStore {
    locks: HashMap<Address, LockedBalance>,
    min_lock_duration: u64,
}

impl LockStore {
    /// Create an empty store enforcing the given minimum lock duration.
    pub fn new(min_lock_duration: u64) -> Self {
        Self { locks: HashMap::new(), min_lock_duration }
    }

    /// Current record for `account` (`EMPTY` if none).
    pub fn get(&self, account: &Address) -> LockedBalance {
        self.locks.get(account).copied().unwrap_or_default()
    }

    /// Replace the record for `account`. Storing `EMPTY` removes it.
    pub fn set(&mut self, account: Address, lock: LockedBalance) {
        if lock.exists() {
            self.locks.insert(account, lock);
        } else {
            self.locks.remove(&account);
        }
    }

    /// Lifecycle state of `account` at `now`.
    pub fn state(&self, account: &Address, now: u64) -> LockState {
        let lock = self.get(account);
        if !lock.exists() {
            LockState::NoLock
        } else if lock.end > now {
            LockState::Active
        } else {
            LockState::Expired
        }
    }

    /// Number of accounts currently holding a lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no account holds a lock.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Accounts currently holding a lock, in no particular order.
    pub fn holders(&self) -> impl Iterator<Item = &Address> {
        self.locks.keys()
    }

    /// Validate a fresh lock of `amount` until `unlock_time` (rounded down to
    /// a week).
    ///
    /// # Errors
    ///
    /// - [`LockStateError::ZeroValue`] if `amount` is zero
    /// - [`LockStateError::LockExists`] if anything is still held, even expired
    /// - [`TimeOrderingError::TooShort`] / [`TimeOrderingError::TooLong`] if the
    ///   rounded duration is outside `[min_lock_duration, MAXTIME]`
    pub fn plan_create(
        &self,
        account: &Address,
        amount: u128,
        unlock_time: u64,
        now: u64,
    ) -> Result<LockedBalance, LedgerError> {
        if self.get(account).exists() {
            return Err(LockStateError::LockExists(*account).into());
        }
        self.fresh_lock(amount, unlock_time, now)
    }

    /// Validate withdrawing an expired lock and immediately locking `amount`
    /// until `unlock_time`. Returns the released amount and the new record.
    ///
    /// # Errors
    ///
    /// Any error of [`plan_withdraw`](Self::plan_withdraw) (without global
    /// unlock) or of [`plan_create`](Self::plan_create) other than
    /// `LockExists`.
    pub fn plan_withdraw_and_create(
        &self,
        account: &Address,
        amount: u128,
        unlock_time: u64,
        now: u64,
    ) -> Result<(u128, LockedBalance), LedgerError> {
        let released = self.plan_withdraw(account, now, false)?;
        let lock = self.fresh_lock(amount, unlock_time, now)?;
        Ok((released, lock))
    }

    /// Validate adding `amount` to an active lock.
    ///
    /// # Errors
    ///
    /// - [`LockStateError::ZeroValue`] if `amount` is zero
    /// - [`LockStateError::NoLock`] / [`LockStateError::Expired`] unless the lock is active
    /// - [`LedgerError::ArithmeticOverflow`] if the total overflows
    pub fn plan_increase_amount(
        &self,
        account: &Address,
        amount: u128,
        now: u64,
    ) -> Result<LockedBalance, LedgerError> {
        if amount == 0 {
            return Err(LockStateError::ZeroValue.into());
        }
        let lock = self.require_active(account, now)?;
        let total = lock.amount.checked_add(amount).ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(LockedBalance { amount: total, end: lock.end })
    }

    /// Validate pushing an active lock's end to `unlock_time` (rounded down).
    ///
    /// # Errors
    ///
    /// - [`LockStateError::NoLock`] / [`LockStateError::Expired`] unless the lock is active
    /// - [`TimeOrderingError::NotLater`] unless the rounded time is after the current end
    /// - [`TimeOrderingError::TooShort`] / [`TimeOrderingError::TooLong`] on the new duration
    pub fn plan_increase_unlock_time(
        &self,
        account: &Address,
        unlock_time: u64,
        now: u64,
    ) -> Result<LockedBalance, LedgerError> {
        let lock = self.require_active(account, now)?;
        let end = round_to_week(unlock_time);
        if end <= lock.end {
            return Err(TimeOrderingError::NotLater { current: lock.end, requested: end }.into());
        }
        self.check_duration(end, now)?;
        Ok(LockedBalance { amount: lock.amount, end })
    }

    /// Validate a withdrawal. Returns the released amount.
    ///
    /// # Errors
    ///
    /// - [`LockStateError::NoLock`] if nothing is held
    /// - [`LockStateError::NotExpired`] if the lock is still active and the
    ///   ledger is not globally unlocked
    pub fn plan_withdraw(
        &self,
        account: &Address,
        now: u64,
        globally_unlocked: bool,
    ) -> Result<u128, LedgerError> {
        let lock = self.get(account);
        if !lock.exists() {
            return Err(LockStateError::NoLock(*account).into());
        }
        if lock.end > now && !globally_unlocked {
            return Err(LockStateError::NotExpired { end: lock.end, now }.into());
        }
        Ok(lock.amount)
    }

    fn fresh_lock(&self, amount: u128, unlock_time: u64, now: u64) -> Result<LockedBalance, LedgerError> {
        if amount == 0 {
            return Err(LockStateError::ZeroValue.into());
        }
        let end = round_to_week(unlock_time);
        self.check_duration(end, now)?;
        Ok(LockedBalance { amount, end })
    }

    fn require_active(&self, account: &Address, now: u64) -> Result<LockedBalance, LedgerError> {
        let lock = self.get(account);
        if !lock.exists() {
            return Err(LockStateError::NoLock(*account).into());
        }
        if lock.end <= now {
            return Err(LockStateError::Expired { end: lock.end, now }.into());
        }
        Ok(lock)
    }

    fn check_duration(&self, end: u64, now: u64) -> Result<(), TimeOrderingError> {
        let duration = end.saturating_sub(now);
        if duration < self.min_lock_duration {
            return Err(TimeOrderingError::TooShort { duration, min: self.min_lock_duration });
        }
        if duration > MAXTIME {
            return Err(TimeOrderingError::TooLong { duration, max: MAXTIME });
        }
        Ok(())
    }
}
