//! Adversarial tests for the Ebb ledger.
//!
//! These tests attack the ledger from a hostile caller's perspective and
//! check that every rejected operation leaves no trace.
//!
//! Attack vectors tested:
//! - Contracts locking without a whitelist entry
//! - Non-admin and non-controller role abuse
//! - Asset transfers failing mid-operation
//! - Stale ledgers beyond the forward-fill cap
//! - Boundary durations and amount overflow

use ebb_core::constants::{MAX_FILL_WEEKS, MAXTIME, WEEK};
use ebb_core::error::{AssetError, LedgerError, LockStateError, PermissionError, TimeOrderingError};
use ebb_core::memory::{ManualClock, MemoryVault};
use ebb_core::traits::{AssetVault, ChainClock};
use ebb_core::types::{Address, Caller, LockedBalance, Point};
use ebb_escrow::{EscrowConfig, VotingEscrow};
use ebb_tests::helpers::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A vault that can be told to refuse outgoing transfers.
#[derive(Clone, Debug, Default)]
struct JammedVault {
    inner: MemoryVault,
    jam_out: bool,
}

impl AssetVault for JammedVault {
    fn transfer_from(&mut self, from: &Address, amount: u128) -> Result<(), AssetError> {
        self.inner.transfer_from(from, amount)
    }

    fn transfer(&mut self, to: &Address, amount: u128) -> Result<(), AssetError> {
        if self.jam_out {
            return Err(AssetError::InsufficientEscrow { have: 0, need: amount });
        }
        self.inner.transfer(to, amount)
    }

    fn escrowed(&self) -> u128 {
        self.inner.escrowed()
    }
}

/// Snapshot of everything a failed operation must leave untouched.
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    epoch: usize,
    last_point: Option<Point>,
    user_epoch: usize,
    locked: LockedBalance,
    supply: u128,
    escrowed: u128,
    slope_at_end: i128,
}

fn snapshot<V: AssetVault>(e: &VotingEscrow<ManualClock, V>, account: &Address) -> Snapshot {
    let locked = e.locked(account);
    Snapshot {
        epoch: e.epoch(),
        last_point: e.point_history(e.epoch()),
        user_epoch: e.user_point_epoch(account),
        locked,
        supply: e.supply(),
        escrowed: e.vault().escrowed(),
        slope_at_end: e.slope_change(locked.end),
    }
}

// ---------------------------------------------------------------------------
// Contract whitelist
// ---------------------------------------------------------------------------

#[test]
fn unlisted_contract_cannot_lock_through_any_entry_point() {
    let mut e = escrow_with(&[0xC0, 1]);
    let contract = addr(0xC0);
    let caller = Caller::contract(contract, addr(1));

    let errs = [
        e.create_lock(&caller, tokens(1), START + 10 * WEEK).unwrap_err(),
        e.increase_amount(&caller, tokens(1)).unwrap_err(),
        e.increase_unlock_time(&caller, START + 20 * WEEK).unwrap_err(),
        e.increase_amount_and_time(&caller, tokens(1), START + 20 * WEEK).unwrap_err(),
        e.withdraw_and_create_lock(&caller, tokens(1), START + 20 * WEEK).unwrap_err(),
    ];
    for err in errs {
        assert!(
            matches!(err, LedgerError::Permission(PermissionError::ContractNotWhitelisted(c)) if c == contract),
            "{err:?}"
        );
    }
    assert_eq!(e.epoch(), 0);
    assert!(e.take_events().is_empty());
}

#[test]
fn contract_keeps_lock_after_delisting_and_can_withdraw() {
    let mut e = escrow_with(&[0xC0, 1]);
    let contract = addr(0xC0);
    let caller = Caller::contract(contract, addr(1));

    e.add_to_whitelist(&eoa(0xAD), contract).unwrap();
    e.create_lock(&caller, tokens(10), START + 4 * WEEK).unwrap();
    e.remove_from_whitelist(&eoa(0xAD), contract).unwrap();

    assert_eq!(e.locked(&contract).amount, tokens(10));
    assert!(e.balance_of(&contract) > 0);
    warp(&mut e, START + 4 * WEEK);
    e.withdraw(&caller).unwrap();
    assert_eq!(e.vault().balance_of(&contract), FUNDING);
}

#[test]
fn third_party_deposit_for_contract_lock_is_allowed() {
    let mut e = escrow_with(&[0xC0, 1]);
    let contract = addr(0xC0);
    e.add_to_whitelist(&eoa(0xAD), contract).unwrap();
    e.create_lock(&Caller::contract(contract, addr(1)), tokens(10), START + 4 * WEEK).unwrap();
    e.remove_from_whitelist(&eoa(0xAD), contract).unwrap();

    // The beneficiary's contract status does not gate a top-up.
    e.deposit_for(&eoa(1), contract, tokens(5)).unwrap();
    assert_eq!(e.locked(&contract).amount, tokens(15));
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[test]
fn roles_cannot_be_usurped() {
    let mut e = escrow_with(&[1]);
    let mallory = eoa(0x66);

    assert!(matches!(
        e.add_to_whitelist(&mallory, addr(0x66)),
        Err(LedgerError::Permission(PermissionError::NotAdmin(_)))
    ));
    assert!(matches!(
        e.trigger_global_unlock(&mallory),
        Err(LedgerError::Permission(PermissionError::NotAdmin(_)))
    ));
    assert!(matches!(
        e.change_controller(&mallory, addr(0x66)),
        Err(LedgerError::Permission(PermissionError::NotController(_)))
    ));
    // A contract relaying for the admin is not the admin.
    assert!(e.add_to_whitelist(&Caller::contract(addr(0x66), admin()), addr(0x66)).is_err());

    assert!(!e.is_whitelisted(&addr(0x66)));
    assert!(!e.global_unlocked());
    assert_eq!(e.controller(), admin());
    assert_eq!(e.admin(), admin());
}

// ---------------------------------------------------------------------------
// Atomicity
// ---------------------------------------------------------------------------

#[test]
fn failed_pull_leaves_ledger_untouched() {
    let mut e = escrow_with(&[1]);
    e.create_lock(&eoa(1), tokens(10), START + 10 * WEEK).unwrap();
    warp(&mut e, START + 2 * WEEK + 5);
    e.take_events();
    let before = snapshot(&e, &addr(1));

    let err = e.increase_amount(&eoa(1), FUNDING).unwrap_err();
    assert!(matches!(err, LedgerError::Asset(AssetError::InsufficientBalance { .. })));
    // A broke third party cannot top up either.
    assert!(e.deposit_for(&eoa(0x77), addr(1), tokens(1)).is_err());

    assert_eq!(snapshot(&e, &addr(1)), before);
    assert!(e.take_events().is_empty());
}

#[test]
fn failed_payout_leaves_ledger_untouched() {
    let mut vault = JammedVault::default();
    vault.inner.mint(addr(1), FUNDING).unwrap();
    let clock = ManualClock::new(START, START_BLOCK, BLOCK_TIME);
    let mut e = VotingEscrow::new(EscrowConfig::new(admin(), asset()), clock, vault).unwrap();

    e.create_lock(&eoa(1), tokens(10), START + 4 * WEEK).unwrap();
    e.clock_mut().advance_to(START + 6 * WEEK);
    e.take_events();
    e.vault_mut().jam_out = true;
    let before = snapshot(&e, &addr(1));

    let err = e.withdraw(&eoa(1)).unwrap_err();
    assert!(matches!(err, LedgerError::Asset(AssetError::InsufficientEscrow { .. })));
    // Relocking for less needs a refund, which is jammed too.
    assert!(e.withdraw_and_create_lock(&eoa(1), tokens(4), START + 20 * WEEK).is_err());
    assert_eq!(snapshot(&e, &addr(1)), before);
    assert!(e.take_events().is_empty());

    // Relocking for more only pulls, so it goes through.
    e.withdraw_and_create_lock(&eoa(1), tokens(12), START + 20 * WEEK).unwrap();
    assert_eq!(e.locked(&addr(1)).amount, tokens(12));
    assert_eq!(e.vault().escrowed(), tokens(12));

    e.vault_mut().jam_out = false;
    e.trigger_global_unlock(&eoa(0xAD)).unwrap();
    e.withdraw(&eoa(1)).unwrap();
    assert_eq!(e.vault().inner.balance_of(&addr(1)), FUNDING);
}

#[test]
fn rejected_mutations_leave_no_trace() {
    let mut e = escrow_with(&[1]);
    e.create_lock(&eoa(1), tokens(10), START + 10 * WEEK).unwrap();
    e.take_events();
    let before = snapshot(&e, &addr(1));

    let errs = [
        e.create_lock(&eoa(1), tokens(1), START + 20 * WEEK).unwrap_err(),
        e.increase_amount(&eoa(1), 0).unwrap_err(),
        e.increase_unlock_time(&eoa(1), START + 9 * WEEK).unwrap_err(),
        e.increase_unlock_time(&eoa(1), START + MAXTIME + WEEK).unwrap_err(),
        e.increase_amount_and_time(&eoa(1), 0, 0).unwrap_err(),
        e.withdraw(&eoa(1)).unwrap_err(),
        e.withdraw_and_create_lock(&eoa(1), tokens(1), START + 20 * WEEK).unwrap_err(),
    ];
    assert!(matches!(errs[0], LedgerError::LockState(LockStateError::LockExists(_))));
    assert!(matches!(errs[1], LedgerError::LockState(LockStateError::ZeroValue)));
    assert!(matches!(errs[2], LedgerError::TimeOrdering(TimeOrderingError::NotLater { .. })));
    assert!(matches!(errs[3], LedgerError::TimeOrdering(TimeOrderingError::TooLong { .. })));
    assert!(matches!(errs[4], LedgerError::LockState(LockStateError::NothingToChange)));
    assert!(matches!(errs[5], LedgerError::LockState(LockStateError::NotExpired { .. })));
    assert!(matches!(errs[6], LedgerError::LockState(LockStateError::NotExpired { .. })));

    assert_eq!(snapshot(&e, &addr(1)), before);
    assert!(e.take_events().is_empty());
}

#[test]
fn expired_lock_cannot_be_grown() {
    let mut e = escrow_with(&[1, 2]);
    e.create_lock(&eoa(1), tokens(10), START + 4 * WEEK).unwrap();
    warp(&mut e, START + 4 * WEEK);

    for err in [
        e.increase_amount(&eoa(1), tokens(1)).unwrap_err(),
        e.deposit_for(&eoa(2), addr(1), tokens(1)).unwrap_err(),
        e.increase_unlock_time(&eoa(1), START + 20 * WEEK).unwrap_err(),
    ] {
        assert!(matches!(err, LedgerError::LockState(LockStateError::Expired { .. })), "{err:?}");
    }
    // Nor replaced without withdrawing first.
    assert!(matches!(
        e.create_lock(&eoa(1), tokens(1), START + 20 * WEEK),
        Err(LedgerError::LockState(LockStateError::LockExists(_)))
    ));
}

// ---------------------------------------------------------------------------
// Duration bounds
// ---------------------------------------------------------------------------

#[test]
fn duration_bounds_are_inclusive_after_rounding() {
    let mut e = escrow_with(&[1, 2, 3]);
    warp(&mut e, START + 100);

    // Rounds down to START + 2 weeks: 100 seconds short of the minimum.
    let err = e.create_lock(&eoa(1), tokens(1), START + 2 * WEEK + 500).unwrap_err();
    assert!(matches!(err, LedgerError::TimeOrdering(TimeOrderingError::TooShort { .. })));

    warp(&mut e, START + WEEK);
    e.create_lock(&eoa(1), tokens(1), START + 3 * WEEK).unwrap();
    e.create_lock(&eoa(2), tokens(1), START + WEEK + MAXTIME).unwrap();
    assert!(e.locked_end(&addr(2)) - (START + WEEK) <= MAXTIME);
}

#[test]
fn custom_minimum_lock_is_enforced_on_extension() {
    let mut vault = MemoryVault::new();
    vault.mint(addr(1), FUNDING).unwrap();
    let config = EscrowConfig::new(admin(), asset()).with_min_lock_duration(8 * WEEK);
    let clock = ManualClock::new(START, START_BLOCK, BLOCK_TIME);
    let mut e = VotingEscrow::new(config, clock, vault).unwrap();

    assert!(e.create_lock(&eoa(1), tokens(1), START + 7 * WEEK).is_err());
    e.create_lock(&eoa(1), tokens(1), START + 8 * WEEK).unwrap();
    warp(&mut e, START + 4 * WEEK);
    // Later than the current end, but only five weeks out.
    let err = e.increase_unlock_time(&eoa(1), START + 9 * WEEK).unwrap_err();
    assert!(matches!(err, LedgerError::TimeOrdering(TimeOrderingError::TooShort { .. })));
    e.increase_unlock_time(&eoa(1), START + 12 * WEEK).unwrap();
}

#[test]
fn oversized_amount_is_rejected_cleanly() {
    let mut vault = MemoryVault::new();
    vault.mint(addr(1), u128::MAX).unwrap();
    let clock = ManualClock::new(START, START_BLOCK, BLOCK_TIME);
    let mut e = VotingEscrow::new(EscrowConfig::new(admin(), asset()), clock, vault).unwrap();

    let err = e.create_lock(&eoa(1), u128::MAX, START + 100 * WEEK).unwrap_err();
    assert!(matches!(err, LedgerError::ArithmeticOverflow));
    assert_eq!(e.epoch(), 0);
    assert_eq!(e.vault().balance_of(&addr(1)), u128::MAX);
}

// ---------------------------------------------------------------------------
// Stale ledger
// ---------------------------------------------------------------------------

#[test]
fn stale_ledger_needs_checkpoints_before_locking() {
    let mut e = escrow_with(&[1, 2]);
    e.create_lock(&eoa(1), tokens(100), START + 100 * WEEK).unwrap();
    let far = START + (2 * MAX_FILL_WEEKS as u64 + 10) * WEEK + 321;
    warp(&mut e, far);

    let before = snapshot(&e, &addr(2));
    let err = e.create_lock(&eoa(2), tokens(1), far + 10 * WEEK).unwrap_err();
    assert!(matches!(err, LedgerError::ForwardFillLimit { max_weeks: MAX_FILL_WEEKS }));
    assert_eq!(snapshot(&e, &addr(2)), before);

    // Withdrawal is a lock mutation too.
    assert!(matches!(e.withdraw(&eoa(1)), Err(LedgerError::ForwardFillLimit { .. })));

    // Reads still work on a stale ledger.
    assert_eq!(e.total_supply(), 0);
    assert_eq!(e.balance_of(&addr(1)), 0);

    assert!(!e.checkpoint());
    assert!(!e.checkpoint());
    assert!(e.checkpoint());
    let last = e.point_history(e.epoch()).unwrap();
    assert_eq!(last.timestamp, far);
    assert_eq!(last.block, e.clock().block_number());

    e.create_lock(&eoa(2), tokens(1), far + 10 * WEEK).unwrap();
    e.withdraw(&eoa(1)).unwrap();
    assert_eq!(e.supply(), tokens(1));
}

#[test]
fn partial_checkpoints_keep_history_consistent() {
    let mut e = escrow_with(&[1]);
    e.create_lock(&eoa(1), tokens(100), START + 100 * WEEK).unwrap();
    let far = START + (MAX_FILL_WEEKS as u64 + 3) * WEEK;
    warp(&mut e, far);
    assert!(!e.checkpoint());

    // Filled weekly points agree with the user's own decay.
    for w in [1u64, 50, 99, 100, 150] {
        let t = START + w * WEEK;
        assert_eq!(e.total_supply_at_t(t), e.balance_of_at_t(&addr(1), t), "week {w}");
    }
    let head = e.clock().block_number();
    assert!(e.total_supply_at(head / 2 + START_BLOCK / 2).is_ok());
}
