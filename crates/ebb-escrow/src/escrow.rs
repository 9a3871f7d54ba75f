//! The vote-escrow ledger.
//!
//! [`VotingEscrow`] owns every piece of state: lock records, the
//! checkpointer (logs, schedule, supply), the whitelist, roles, and the
//! event buffer. It samples the injected [`ChainClock`] once per operation
//! and moves assets through the injected [`AssetVault`].
//!
//! Every mutating operation validates, plans its checkpoint, performs at
//! most one asset transfer, and only then commits. Any error leaves the
//! ledger exactly as it was.

use std::collections::HashSet;

use ebb_core::error::{LedgerError, LockStateError, PermissionError};
use ebb_core::traits::{AssetVault, ChainClock};
use ebb_core::types::{Address, Caller, LockedBalance, Point};
use tracing::{info, warn};

use crate::checkpoint::{Checkpointer, Committed, LockDelta};
use crate::config::EscrowConfig;
use crate::events::{LedgerEvent, LockAction};
use crate::lock::{LockState, LockStore};
use crate::query::HistoryQuery;

/// Asset movement accompanying a lock mutation.
#[derive(Clone, Copy, Debug)]
enum Transfer {
    None,
    In(Address, u128),
    Out(Address, u128),
}

#[derive(Clone, Debug)]
pub struct VotingEscrow<C, V> {
    config: EscrowConfig,
    clock: C,
    vault: V,
    locks: LockStore,
    checkpointer: Checkpointer,
    whitelist: HashSet<Address>,
    global_unlocked: bool,
    controller: Address,
    events: Vec<LedgerEvent>,
}

impl<C: ChainClock, V: AssetVault> VotingEscrow<C, V> {
    /// Construct a ledger, recording the all-zero global point at the
    /// clock's current time and block. The admin is also the initial
    /// controller.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Config`] if the configuration is invalid.
    pub fn new(config: EscrowConfig, clock: C, vault: V) -> Result<Self, LedgerError> {
        config.validate()?;
        let (now, block) = (clock.timestamp(), clock.block_number());
        info!(
            admin = %config.admin,
            asset = %config.asset,
            min_lock = config.min_lock_duration,
            now,
            block,
            "escrow: initialized"
        );
        Ok(Self {
            locks: LockStore::new(config.min_lock_duration),
            checkpointer: Checkpointer::new(now, block),
            whitelist: HashSet::new(),
            global_unlocked: false,
            controller: config.admin,
            events: Vec::new(),
            config,
            clock,
            vault,
        })
    }

    fn head(&self) -> (u64, u64) {
        (self.clock.timestamp(), self.clock.block_number())
    }

    fn ensure_locking_open(&self) -> Result<(), PermissionError> {
        if self.global_unlocked {
            return Err(PermissionError::GloballyUnlocked);
        }
        Ok(())
    }

    /// Contracts may only hold locks if whitelisted.
    fn assert_not_contract(&self, caller: &Caller) -> Result<(), PermissionError> {
        if caller.is_contract() && !self.whitelist.contains(&caller.sender) {
            return Err(PermissionError::ContractNotWhitelisted(caller.sender));
        }
        Ok(())
    }

    fn ensure_admin(&self, caller: &Caller) -> Result<(), PermissionError> {
        if caller.sender != self.config.admin {
            return Err(PermissionError::NotAdmin(caller.sender));
        }
        Ok(())
    }

    /// Plan, transfer, commit. The only fallible step after planning is the
    /// transfer, and the vault applies it all-or-nothing.
    fn apply(
        &mut self,
        delta: LockDelta,
        transfer: Transfer,
        now: u64,
        block: u64,
    ) -> Result<Committed, LedgerError> {
        let plan = self.checkpointer.plan(&delta, now, block)?;
        match transfer {
            Transfer::None => {}
            Transfer::In(from, amount) => self.vault.transfer_from(&from, amount)?,
            Transfer::Out(to, amount) => self.vault.transfer(&to, amount)?,
        }
        let committed = self.checkpointer.commit(plan);
        self.locks.set(delta.account, delta.new);
        Ok(committed)
    }

    fn emit_supply(&mut self, committed: &Committed) {
        self.events.push(LedgerEvent::Supply {
            previous: committed.previous_supply,
            current: committed.supply,
        });
    }

    /// Shared tail of every deposit-style mutation.
    #[allow(clippy::too_many_arguments)]
    fn deposit(
        &mut self,
        account: Address,
        funder: Address,
        value: u128,
        new: LockedBalance,
        action: LockAction,
        now: u64,
        block: u64,
    ) -> Result<(), LedgerError> {
        let old = self.locks.get(&account);
        let transfer = if value > 0 { Transfer::In(funder, value) } else { Transfer::None };
        let committed = self.apply(LockDelta { account, old, new }, transfer, now, block)?;

        info!(%account, value, end = new.end, ?action, epoch = committed.epoch, "escrow: deposit");
        self.events.push(LedgerEvent::Deposit {
            account,
            value,
            unlock_time: new.end,
            action,
            timestamp: now,
        });
        self.emit_supply(&committed);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lock mutations
    // ------------------------------------------------------------------

    /// Lock `value` for the caller until `unlock_time` (rounded down to a
    /// week).
    ///
    /// # Errors
    ///
    /// - [`PermissionError::ContractNotWhitelisted`] for non-whitelisted contracts
    /// - [`PermissionError::GloballyUnlocked`] after global unlock
    /// - [`LockStateError::ZeroValue`] / [`LockStateError::LockExists`]
    /// - [`TimeOrderingError`](ebb_core::error::TimeOrderingError) if the
    ///   duration is outside `[min_lock_duration, MAXTIME]`
    /// - [`LedgerError::Asset`] if the transfer in fails
    pub fn create_lock(&mut self, caller: &Caller, value: u128, unlock_time: u64) -> Result<(), LedgerError> {
        self.assert_not_contract(caller)?;
        self.ensure_locking_open()?;
        let (now, block) = self.head();
        let account = caller.sender;
        let new = self.locks.plan_create(&account, value, unlock_time, now)?;
        self.deposit(account, account, value, new, LockAction::CreateLock, now, block)
    }

    /// Add `value`, paid by the caller, to `account`'s active lock.
    ///
    /// Anyone may top up anyone's lock; the contract check does not apply.
    ///
    /// # Errors
    ///
    /// - [`PermissionError::GloballyUnlocked`] after global unlock
    /// - [`LockStateError::ZeroValue`], [`LockStateError::NoLock`], [`LockStateError::Expired`]
    /// - [`LedgerError::Asset`] if the transfer in fails
    pub fn deposit_for(&mut self, caller: &Caller, account: Address, value: u128) -> Result<(), LedgerError> {
        self.ensure_locking_open()?;
        let (now, block) = self.head();
        let new = self.locks.plan_increase_amount(&account, value, now)?;
        self.deposit(account, caller.sender, value, new, LockAction::DepositFor, now, block)
    }

    /// Add `value` to the caller's active lock.
    ///
    /// # Errors
    ///
    /// As [`deposit_for`](Self::deposit_for), plus the contract check.
    pub fn increase_amount(&mut self, caller: &Caller, value: u128) -> Result<(), LedgerError> {
        self.assert_not_contract(caller)?;
        self.ensure_locking_open()?;
        let (now, block) = self.head();
        let account = caller.sender;
        let new = self.locks.plan_increase_amount(&account, value, now)?;
        self.deposit(account, account, value, new, LockAction::IncreaseAmount, now, block)
    }

    /// Push the caller's active lock end to `unlock_time` (rounded down).
    ///
    /// # Errors
    ///
    /// - [`PermissionError`] for the contract check or after global unlock
    /// - [`LockStateError::NoLock`] / [`LockStateError::Expired`]
    /// - [`TimeOrderingError`](ebb_core::error::TimeOrderingError) if not later
    ///   than the current end or outside the duration bounds
    pub fn increase_unlock_time(&mut self, caller: &Caller, unlock_time: u64) -> Result<(), LedgerError> {
        self.assert_not_contract(caller)?;
        self.ensure_locking_open()?;
        let (now, block) = self.head();
        let account = caller.sender;
        let new = self.locks.plan_increase_unlock_time(&account, unlock_time, now)?;
        self.deposit(account, account, 0, new, LockAction::IncreaseUnlockTime, now, block)
    }

    /// Add `value` and/or push the end to `unlock_time` in one checkpoint.
    /// Zero means "leave unchanged" for either argument, but not both.
    ///
    /// # Errors
    ///
    /// [`LockStateError::NothingToChange`] if both are zero, otherwise the
    /// union of [`increase_amount`](Self::increase_amount) and
    /// [`increase_unlock_time`](Self::increase_unlock_time).
    pub fn increase_amount_and_time(
        &mut self,
        caller: &Caller,
        value: u128,
        unlock_time: u64,
    ) -> Result<(), LedgerError> {
        self.assert_not_contract(caller)?;
        self.ensure_locking_open()?;
        if value == 0 && unlock_time == 0 {
            return Err(LockStateError::NothingToChange.into());
        }
        let (now, block) = self.head();
        let account = caller.sender;

        let mut new = self.locks.get(&account);
        if value > 0 {
            new = self.locks.plan_increase_amount(&account, value, now)?;
        }
        if unlock_time > 0 {
            new.end = self.locks.plan_increase_unlock_time(&account, unlock_time, now)?.end;
        }
        let action = match (value > 0, unlock_time > 0) {
            (true, true) => LockAction::IncreaseAmountAndTime,
            (true, false) => LockAction::IncreaseAmount,
            _ => LockAction::IncreaseUnlockTime,
        };
        self.deposit(account, account, value, new, action, now, block)
    }

    /// Release the caller's lock once expired, or at any time after global
    /// unlock.
    ///
    /// # Errors
    ///
    /// - [`LockStateError::NoLock`] / [`LockStateError::NotExpired`]
    /// - [`LedgerError::Asset`] if the transfer out fails
    pub fn withdraw(&mut self, caller: &Caller) -> Result<(), LedgerError> {
        let (now, block) = self.head();
        let account = caller.sender;
        let value = self.locks.plan_withdraw(&account, now, self.global_unlocked)?;
        let old = self.locks.get(&account);
        let delta = LockDelta { account, old, new: LockedBalance::EMPTY };
        let committed = self.apply(delta, Transfer::Out(account, value), now, block)?;

        info!(%account, value, epoch = committed.epoch, "escrow: withdraw");
        self.events.push(LedgerEvent::Withdraw { account, value, timestamp: now });
        self.emit_supply(&committed);
        Ok(())
    }

    /// Withdraw an expired lock and lock `value` until `unlock_time`, as one
    /// checkpoint. Only the net difference is transferred.
    ///
    /// # Errors
    ///
    /// - [`PermissionError::GloballyUnlocked`] after global unlock (use
    ///   [`withdraw`](Self::withdraw) instead)
    /// - any error of [`withdraw`](Self::withdraw) or [`create_lock`](Self::create_lock)
    pub fn withdraw_and_create_lock(
        &mut self,
        caller: &Caller,
        value: u128,
        unlock_time: u64,
    ) -> Result<(), LedgerError> {
        self.assert_not_contract(caller)?;
        self.ensure_locking_open()?;
        let (now, block) = self.head();
        let account = caller.sender;
        let old = self.locks.get(&account);
        let (released, new) = self.locks.plan_withdraw_and_create(&account, value, unlock_time, now)?;

        let transfer = if value > released {
            Transfer::In(account, value - released)
        } else if released > value {
            Transfer::Out(account, released - value)
        } else {
            Transfer::None
        };
        let committed = self.apply(LockDelta { account, old, new }, transfer, now, block)?;

        info!(%account, released, value, end = new.end, epoch = committed.epoch, "escrow: relock");
        self.events.push(LedgerEvent::Withdraw { account, value: released, timestamp: now });
        self.events.push(LedgerEvent::Deposit {
            account,
            value,
            unlock_time: new.end,
            action: LockAction::CreateLock,
            timestamp: now,
        });
        self.emit_supply(&committed);
        Ok(())
    }

    /// Bring the global log up to "now" without touching any lock.
    ///
    /// Returns `false` if the forward fill hit its step cap; the progress
    /// made is kept and another call continues from there.
    pub fn checkpoint(&mut self) -> bool {
        let (now, block) = self.head();
        let plan = self.checkpointer.plan_checkpoint(now, block);
        let committed = self.checkpointer.commit(plan);
        info!(epoch = committed.epoch, caught_up = committed.caught_up, "escrow: checkpoint");
        committed.caught_up
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Allow `contract` to hold locks.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotAdmin`] unless called by the admin.
    pub fn add_to_whitelist(&mut self, caller: &Caller, contract: Address) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if self.whitelist.insert(contract) {
            info!(%contract, "escrow: whitelisted");
            self.events.push(LedgerEvent::WhitelistAdded { contract });
        }
        Ok(())
    }

    /// Stop `contract` from creating or growing locks. Existing locks stay.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotAdmin`] unless called by the admin.
    pub fn remove_from_whitelist(&mut self, caller: &Caller, contract: Address) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if self.whitelist.remove(&contract) {
            info!(%contract, "escrow: removed from whitelist");
            self.events.push(LedgerEvent::WhitelistRemoved { contract });
        }
        Ok(())
    }

    /// Permanently unlock every lock. One-way; repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotAdmin`] unless called by the admin.
    pub fn trigger_global_unlock(&mut self, caller: &Caller) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if !self.global_unlocked {
            let now = self.clock.timestamp();
            self.global_unlocked = true;
            warn!(now, "escrow: global unlock triggered");
            self.events.push(LedgerEvent::GlobalUnlock { timestamp: now });
        }
        Ok(())
    }

    /// Hand the controller role to `controller`.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotController`] unless called by the current controller.
    pub fn change_controller(&mut self, caller: &Caller, controller: Address) -> Result<(), LedgerError> {
        if caller.sender != self.controller {
            return Err(PermissionError::NotController(caller.sender).into());
        }
        let previous = std::mem::replace(&mut self.controller, controller);
        info!(%previous, %controller, "escrow: controller changed");
        self.events.push(LedgerEvent::ControllerChanged { previous, current: controller });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// History view as of the clock's current head.
    pub fn query(&self) -> HistoryQuery<'_> {
        let (now, block) = self.head();
        HistoryQuery::new(&self.checkpointer, now, block)
    }

    /// Current voting power of `account`.
    pub fn balance_of(&self, account: &Address) -> u128 {
        let now = self.clock.timestamp();
        self.query().balance_of_at_t(account, now)
    }

    /// Voting power of `account` at timestamp `t`.
    pub fn balance_of_at_t(&self, account: &Address, t: u64) -> u128 {
        self.query().balance_of_at_t(account, t)
    }

    /// Voting power of `account` at `block`.
    ///
    /// # Errors
    ///
    /// [`QueryError::FutureBlock`](ebb_core::error::QueryError::FutureBlock)
    /// if `block` is beyond the current head.
    pub fn balance_of_at(&self, account: &Address, block: u64) -> Result<u128, LedgerError> {
        Ok(self.query().balance_of_at(account, block)?)
    }

    /// Current total voting power.
    pub fn total_supply(&self) -> u128 {
        let now = self.clock.timestamp();
        self.query().total_supply_at_t(now)
    }

    /// Total voting power at timestamp `t`.
    pub fn total_supply_at_t(&self, t: u64) -> u128 {
        self.query().total_supply_at_t(t)
    }

    /// Total voting power at `block`.
    ///
    /// # Errors
    ///
    /// [`QueryError::FutureBlock`](ebb_core::error::QueryError::FutureBlock)
    /// if `block` is beyond the current head.
    pub fn total_supply_at(&self, block: u64) -> Result<u128, LedgerError> {
        Ok(self.query().total_supply_at(block)?)
    }

    pub fn locked(&self, account: &Address) -> LockedBalance {
        self.locks.get(account)
    }

    pub fn locked_end(&self, account: &Address) -> u64 {
        self.locks.get(account).end
    }

    /// Accounts currently holding a lock, in no particular order.
    pub fn holders(&self) -> impl Iterator<Item = &Address> {
        self.locks.holders()
    }

    pub fn lock_state(&self, account: &Address) -> LockState {
        self.locks.state(account, self.clock.timestamp())
    }

    /// Slope of `account`'s latest user point (`<= 0`; zero if none).
    pub fn last_user_slope(&self, account: &Address) -> i128 {
        self.checkpointer.users().last(account).map_or(0, |p| p.slope)
    }

    /// Timestamp of `account`'s user point at `epoch` (zero if none).
    pub fn user_point_history_ts(&self, account: &Address, epoch: usize) -> u64 {
        self.checkpointer
            .users()
            .get(account, epoch)
            .map_or(0, |p| p.timestamp)
    }

    pub fn user_point(&self, account: &Address, epoch: usize) -> Option<Point> {
        self.checkpointer.users().get(account, epoch)
    }

    pub fn user_point_epoch(&self, account: &Address) -> usize {
        self.checkpointer.users().epoch(account)
    }

    pub fn point_history(&self, epoch: usize) -> Option<Point> {
        self.checkpointer.global().get(epoch).copied()
    }

    /// Latest global epoch.
    pub fn epoch(&self) -> usize {
        self.checkpointer.global().epoch()
    }

    pub fn slope_change(&self, t: u64) -> i128 {
        self.checkpointer.schedule().get(t)
    }

    /// Upcoming slope changes after `now`, up to and including `until`.
    pub fn scheduled_expiries(&self, until: u64) -> Vec<(u64, i128)> {
        let now = self.clock.timestamp();
        self.checkpointer.schedule().between(now, until).collect()
    }

    /// Nominal sum of all locked amounts (not decayed).
    pub fn supply(&self) -> u128 {
        self.checkpointer.supply()
    }

    pub fn is_whitelisted(&self, contract: &Address) -> bool {
        self.whitelist.contains(contract)
    }

    pub fn global_unlocked(&self) -> bool {
        self.global_unlocked
    }

    pub fn admin(&self) -> Address {
        self.config.admin
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Drain buffered events in emission order.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }
}
