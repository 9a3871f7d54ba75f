//! Criterion benchmarks for ebb-escrow hot paths.
//!
//! Covers: forward fill across a full year, lock creation, and historical
//! supply queries over a populated ledger.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ebb_core::constants::{UNIT, WEEK};
use ebb_core::memory::{ManualClock, MemoryVault};
use ebb_core::traits::ChainClock;
use ebb_core::types::{Address, Caller, Point};
use ebb_escrow::checkpoint::fill_forward;
use ebb_escrow::slope::SlopeSchedule;
use ebb_escrow::{EscrowConfig, VotingEscrow};

const T0: u64 = 3_000 * WEEK;

fn populated(holders: u8) -> VotingEscrow<ManualClock, MemoryVault> {
    let mut vault = MemoryVault::new();
    for seed in 1..=holders {
        vault.mint(Address::from_seed(seed), 1_000 * UNIT).unwrap();
    }
    let config = EscrowConfig::new(Address::from_seed(0xAD), Address::from_seed(0xEE));
    let mut escrow = VotingEscrow::new(config, ManualClock::new(T0, 0, 12), vault).unwrap();
    for seed in 1..=holders {
        let caller = Caller::account(Address::from_seed(seed));
        let end = escrow.clock().timestamp() + u64::from(seed % 100 + 3) * WEEK;
        escrow.create_lock(&caller, 100 * UNIT, end).unwrap();
        escrow.clock_mut().advance(WEEK / 3);
    }
    escrow
}

fn bench_fill_forward(c: &mut Criterion) {
    let mut schedule = SlopeSchedule::new();
    for w in 1..=52 {
        schedule.set(T0 + w * WEEK, 1_000);
    }
    let last = Point { bias: 52 * 1_000 * WEEK as i128, slope: -52_000, timestamp: T0, block: 0 };

    c.bench_function("fill_forward_52_weeks", |b| {
        b.iter(|| fill_forward(black_box(&last), &schedule, T0 + 52 * WEEK, 2_620_800, 255))
    });
}

fn bench_create_lock(c: &mut Criterion) {
    let base = populated(50);
    let caller = Caller::account(Address::from_seed(0xF0));

    c.bench_function("create_lock", |b| {
        b.iter_batched(
            || {
                let mut escrow = base.clone();
                escrow.vault_mut().mint(caller.sender, UNIT).unwrap();
                escrow
            },
            |mut escrow| escrow.create_lock(&caller, black_box(UNIT), T0 + 100 * WEEK),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_total_supply_at(c: &mut Criterion) {
    let escrow = populated(200);
    let head = escrow.clock().block_number();

    c.bench_function("total_supply_at_block", |b| {
        b.iter(|| escrow.total_supply_at(black_box(head / 2)))
    });
}

criterion_group!(benches, bench_fill_forward, bench_create_lock, bench_total_supply_at);
criterion_main!(benches);
