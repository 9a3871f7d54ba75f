//! ebb-cli — Command-line simulator for the Ebb vote-escrow ledger.
//!
//! Replays JSON scenario scripts against an in-memory ledger on a manual
//! clock, or runs a built-in staggered-lock simulation, and prints one JSON
//! line per step followed by a ledger summary.

mod script;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ebb_core::constants::{MAXTIME, UNIT, WEEK};
use ebb_core::traits::ChainClock;
use ebb_core::types::{Address, Caller};
use serde::Serialize;
use tracing::info;

use crate::script::{run_step, summarize, RunSettings, Script};

#[derive(Parser, Debug)]
#[command(name = "ebb-cli")]
#[command(version, about = "Vote-escrow ledger simulator")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON scenario script.
    Run(RunArgs),
    /// Lock for a number of staggered accounts and print the weekly supply curve.
    Simulate(SimulateArgs),
}

/// Ledger and clock settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct LedgerArgs {
    /// Minimum lock duration in weeks (at least 2)
    #[arg(long, default_value_t = 2)]
    min_lock_weeks: u64,

    /// Clock start, seconds since the epoch
    #[arg(long, default_value_t = 2_800 * WEEK)]
    start_time: u64,

    /// First block number
    #[arg(long, default_value_t = 1)]
    start_block: u64,

    /// Seconds per block
    #[arg(long, default_value_t = 12)]
    block_time: u64,

    /// Admin address (hex)
    #[arg(long, default_value_t = Address::from_seed(0xAD))]
    admin: Address,
}

impl LedgerArgs {
    fn settings(&self) -> RunSettings {
        RunSettings {
            admin: self.admin,
            asset: Address::from_seed(0xEE),
            min_lock_weeks: self.min_lock_weeks,
            start_time: self.start_time,
            start_block: self.start_block,
            block_time: self.block_time,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the scenario script
    script: PathBuf,

    /// Stop at the first failing step
    #[arg(long)]
    strict: bool,

    #[command(flatten)]
    ledger: LedgerArgs,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of locking accounts
    #[arg(long, default_value_t = 8)]
    accounts: u8,

    /// Weeks to simulate
    #[arg(long, default_value_t = 110)]
    weeks: u64,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Run(args) => run(args, &mut out),
        Commands::Simulate(args) => simulate(args, &mut out),
    }
}

/// Write `value` as one JSON line.
fn emit<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}

fn run<W: Write>(args: RunArgs, out: &mut W) -> Result<()> {
    let json = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read {}", args.script.display()))?;
    let script = Script::from_json(&json)?;
    let settings = args.ledger.settings().merged(&script.config);
    let mut escrow = settings.build()?;
    info!(steps = script.steps.len(), script = %args.script.display(), "cli: running script");

    for (i, step) in script.steps.iter().enumerate() {
        let report = run_step(&mut escrow, i, step);
        emit(out, &report)?;
        if args.strict {
            if let Some(err) = &report.error {
                bail!("step {i} ({}) failed: {err}", report.op);
            }
        }
    }
    emit(out, &summarize(&escrow, MAXTIME))
}

/// One week of the simulated supply curve.
#[derive(Serialize)]
struct WeekSample {
    week: u64,
    timestamp: u64,
    block: u64,
    total_supply: u128,
    locked: u128,
}

fn simulate<W: Write>(args: SimulateArgs, out: &mut W) -> Result<()> {
    if args.accounts == 0 {
        bail!("--accounts must be at least 1");
    }
    let settings = args.ledger.settings();
    let mut escrow = settings.build()?;
    let min_weeks = settings.min_lock_weeks.max(2);

    // Account i locks (i + 1) * 100 tokens in week i, for a spread of durations.
    for i in 0..args.accounts {
        let account = Address::from_seed(i.wrapping_add(1));
        let amount = u128::from(i) * 100 * UNIT + 100 * UNIT;
        let weeks = min_weeks + 1 + (u64::from(i) * 13) % (100 - min_weeks.min(99));
        escrow.vault_mut().mint(account, amount)?;
        let unlock = escrow.clock().timestamp() + weeks.min(104) * WEEK;
        escrow
            .create_lock(&Caller::account(account), amount, unlock)
            .with_context(|| format!("lock for {account} failed"))?;
        escrow.clock_mut().advance(WEEK);
    }

    for week in 0..=args.weeks {
        if !escrow.checkpoint() {
            bail!("ledger fell too far behind at week {week}");
        }
        emit(
            out,
            &WeekSample {
                week,
                timestamp: escrow.clock().timestamp(),
                block: escrow.clock().block_number(),
                total_supply: escrow.total_supply(),
                locked: escrow.supply(),
            },
        )?;
        for account in escrow.holders().copied().collect::<Vec<_>>() {
            if escrow.locked(&account).is_expired(escrow.clock().timestamp()) {
                escrow.withdraw(&Caller::account(account))?;
            }
        }
        escrow.clock_mut().advance(WEEK);
    }
    emit(out, &summarize(&escrow, MAXTIME))
}

/// Install a tracing subscriber writing to stderr.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
