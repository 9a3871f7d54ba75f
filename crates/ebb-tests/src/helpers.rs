//! Shared test helpers for scenario and property tests.

use ebb_core::constants::{UNIT, WEEK};
use ebb_core::memory::{ManualClock, MemoryVault};
use ebb_core::types::{Address, Caller};
use ebb_escrow::{EscrowConfig, VotingEscrow};

/// Week-aligned start time for every fixture.
pub const START: u64 = 2_500 * WEEK;

/// First block number of every fixture.
pub const START_BLOCK: u64 = 1_000;

/// Seconds per block.
pub const BLOCK_TIME: u64 = 12;

/// Tokens minted to each funded account.
pub const FUNDING: u128 = 1_000_000 * UNIT;

pub type Escrow = VotingEscrow<ManualClock, MemoryVault>;

/// Simple address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address::from_seed(seed)
}

pub fn admin() -> Address {
    addr(0xAD)
}

pub fn asset() -> Address {
    addr(0xEE)
}

/// Externally owned caller.
pub fn eoa(seed: u8) -> Caller {
    Caller::account(addr(seed))
}

/// Whole tokens in base units.
pub fn tokens(n: u128) -> u128 {
    n * UNIT
}

/// Ledger at [`START`] with each of `funded` holding [`FUNDING`].
pub fn escrow_with(funded: &[u8]) -> Escrow {
    let mut vault = MemoryVault::new();
    for &seed in funded {
        vault.mint(addr(seed), FUNDING).unwrap();
    }
    let clock = ManualClock::new(START, START_BLOCK, BLOCK_TIME);
    VotingEscrow::new(EscrowConfig::new(admin(), asset()), clock, vault).unwrap()
}

/// Jump the ledger's clock to `t`.
pub fn warp(escrow: &mut Escrow, t: u64) {
    escrow.clock_mut().advance_to(t);
}

/// Sum of `balance_of_at_t` over `accounts`.
pub fn sum_balances(escrow: &Escrow, accounts: &[Address], t: u64) -> u128 {
    accounts.iter().map(|a| escrow.balance_of_at_t(a, t)).sum()
}
