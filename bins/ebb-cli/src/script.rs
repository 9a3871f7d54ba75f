//! JSON scenario scripts.
//!
//! A script is an optional [`ScenarioConfig`] plus a list of [`Step`]s.
//! Amounts are whole tokens and durations are whole weeks counted from the
//! clock's time when the step runs.
//!
//! ```json
//! {
//!   "config": { "min_lock_weeks": 4 },
//!   "steps": [
//!     { "mint": { "account": "0x…01", "amount": 1000 } },
//!     { "create_lock": { "account": "0x…01", "amount": 500, "weeks": 52 } },
//!     { "advance_weeks": { "weeks": 26 } },
//!     { "balance_of": { "account": "0x…01" } },
//!     "checkpoint"
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use ebb_core::constants::{UNIT, WEEK};
use ebb_core::error::LedgerError;
use ebb_core::memory::{ManualClock, MemoryVault};
use ebb_core::traits::ChainClock;
use ebb_core::types::{Address, Caller};
use ebb_escrow::{EscrowConfig, LedgerEvent, VotingEscrow};
use serde::{Deserialize, Serialize};

pub type Escrow = VotingEscrow<ManualClock, MemoryVault>;

/// Ledger and clock settings. Every field set here overrides the
/// corresponding command-line flag.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub admin: Option<Address>,
    pub asset: Option<Address>,
    pub min_lock_weeks: Option<u64>,
    pub start_time: Option<u64>,
    pub start_block: Option<u64>,
    pub block_time: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub admin: Address,
    pub asset: Address,
    pub min_lock_weeks: u64,
    pub start_time: u64,
    pub start_block: u64,
    pub block_time: u64,
}

impl RunSettings {
    /// Apply script overrides on top of these settings.
    pub fn merged(mut self, overrides: &ScenarioConfig) -> Self {
        if let Some(admin) = overrides.admin {
            self.admin = admin;
        }
        if let Some(asset) = overrides.asset {
            self.asset = asset;
        }
        if let Some(weeks) = overrides.min_lock_weeks {
            self.min_lock_weeks = weeks;
        }
        if let Some(t) = overrides.start_time {
            self.start_time = t;
        }
        if let Some(b) = overrides.start_block {
            self.start_block = b;
        }
        if let Some(bt) = overrides.block_time {
            self.block_time = bt;
        }
        self
    }

    /// Build an empty ledger at the configured start.
    pub fn build(&self) -> Result<Escrow> {
        let config = EscrowConfig::new(self.admin, self.asset)
            .with_min_lock_duration(self.min_lock_weeks.saturating_mul(WEEK));
        let clock = ManualClock::new(self.start_time, self.start_block, self.block_time);
        VotingEscrow::new(config, clock, MemoryVault::new()).context("invalid ledger configuration")
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub config: ScenarioConfig,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse scenario script")
    }
}

/// One scripted operation. `origin`, where accepted, marks the call as
/// coming from a contract at `account` on behalf of `origin`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Advance { seconds: u64 },
    AdvanceWeeks { weeks: u64 },
    Mine { blocks: u64 },
    Mint { account: Address, amount: u64 },
    CreateLock {
        account: Address,
        amount: u64,
        weeks: u64,
        #[serde(default)]
        origin: Option<Address>,
    },
    DepositFor { from: Address, account: Address, amount: u64 },
    IncreaseAmount {
        account: Address,
        amount: u64,
        #[serde(default)]
        origin: Option<Address>,
    },
    IncreaseUnlockTime {
        account: Address,
        weeks: u64,
        #[serde(default)]
        origin: Option<Address>,
    },
    IncreaseAmountAndTime {
        account: Address,
        #[serde(default)]
        amount: u64,
        #[serde(default)]
        weeks: u64,
        #[serde(default)]
        origin: Option<Address>,
    },
    Withdraw { account: Address },
    WithdrawAndCreateLock {
        account: Address,
        amount: u64,
        weeks: u64,
        #[serde(default)]
        origin: Option<Address>,
    },
    Checkpoint,
    AddToWhitelist {
        contract: Address,
        #[serde(default)]
        caller: Option<Address>,
    },
    RemoveFromWhitelist {
        contract: Address,
        #[serde(default)]
        caller: Option<Address>,
    },
    GlobalUnlock {
        #[serde(default)]
        caller: Option<Address>,
    },
    ChangeController { caller: Address, controller: Address },
    BalanceOf { account: Address },
    BalanceOfAt { account: Address, block: u64 },
    TotalSupply,
    TotalSupplyAt { block: u64 },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Advance { .. } => "advance",
            Step::AdvanceWeeks { .. } => "advance_weeks",
            Step::Mine { .. } => "mine",
            Step::Mint { .. } => "mint",
            Step::CreateLock { .. } => "create_lock",
            Step::DepositFor { .. } => "deposit_for",
            Step::IncreaseAmount { .. } => "increase_amount",
            Step::IncreaseUnlockTime { .. } => "increase_unlock_time",
            Step::IncreaseAmountAndTime { .. } => "increase_amount_and_time",
            Step::Withdraw { .. } => "withdraw",
            Step::WithdrawAndCreateLock { .. } => "withdraw_and_create_lock",
            Step::Checkpoint => "checkpoint",
            Step::AddToWhitelist { .. } => "add_to_whitelist",
            Step::RemoveFromWhitelist { .. } => "remove_from_whitelist",
            Step::GlobalUnlock { .. } => "global_unlock",
            Step::ChangeController { .. } => "change_controller",
            Step::BalanceOf { .. } => "balance_of",
            Step::BalanceOfAt { .. } => "balance_of_at",
            Step::TotalSupply => "total_supply",
            Step::TotalSupplyAt { .. } => "total_supply_at",
        }
    }
}

/// Outcome of one step, printed as a JSON line.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    pub timestamp: u64,
    pub block: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caught_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<LedgerEvent>,
}

fn tokens(n: u64) -> u128 {
    u128::from(n) * UNIT
}

fn caller(account: Address, origin: Option<Address>) -> Caller {
    match origin {
        Some(origin) => Caller::contract(account, origin),
        None => Caller::account(account),
    }
}

/// What a successful step produced.
#[derive(Default)]
struct Outcome {
    value: Option<u128>,
    caught_up: Option<bool>,
}

impl Outcome {
    fn value(v: u128) -> Self {
        Self { value: Some(v), caught_up: None }
    }
}

fn apply(escrow: &mut Escrow, step: &Step) -> Result<Outcome, LedgerError> {
    let now = escrow.clock().timestamp();
    let admin = Caller::account(escrow.admin());
    let after = |weeks: u64| now.saturating_add(weeks.saturating_mul(WEEK));

    match step {
        Step::Advance { seconds } => escrow.clock_mut().advance(*seconds),
        Step::AdvanceWeeks { weeks } => escrow.clock_mut().advance(weeks.saturating_mul(WEEK)),
        Step::Mine { blocks } => escrow.clock_mut().mine(*blocks),
        Step::Mint { account, amount } => escrow.vault_mut().mint(*account, tokens(*amount))?,
        Step::CreateLock { account, amount, weeks, origin } => {
            escrow.create_lock(&caller(*account, *origin), tokens(*amount), after(*weeks))?
        }
        Step::DepositFor { from, account, amount } => {
            escrow.deposit_for(&Caller::account(*from), *account, tokens(*amount))?
        }
        Step::IncreaseAmount { account, amount, origin } => {
            escrow.increase_amount(&caller(*account, *origin), tokens(*amount))?
        }
        Step::IncreaseUnlockTime { account, weeks, origin } => {
            escrow.increase_unlock_time(&caller(*account, *origin), after(*weeks))?
        }
        Step::IncreaseAmountAndTime { account, amount, weeks, origin } => {
            let unlock = if *weeks == 0 { 0 } else { after(*weeks) };
            escrow.increase_amount_and_time(&caller(*account, *origin), tokens(*amount), unlock)?
        }
        Step::Withdraw { account } => escrow.withdraw(&Caller::account(*account))?,
        Step::WithdrawAndCreateLock { account, amount, weeks, origin } => {
            escrow.withdraw_and_create_lock(&caller(*account, *origin), tokens(*amount), after(*weeks))?
        }
        Step::Checkpoint => {
            return Ok(Outcome { value: None, caught_up: Some(escrow.checkpoint()) });
        }
        Step::AddToWhitelist { contract, caller } => {
            let who = caller.map_or(admin, Caller::account);
            escrow.add_to_whitelist(&who, *contract)?
        }
        Step::RemoveFromWhitelist { contract, caller } => {
            let who = caller.map_or(admin, Caller::account);
            escrow.remove_from_whitelist(&who, *contract)?
        }
        Step::GlobalUnlock { caller } => {
            let who = caller.map_or(admin, Caller::account);
            escrow.trigger_global_unlock(&who)?
        }
        Step::ChangeController { caller, controller } => {
            escrow.change_controller(&Caller::account(*caller), *controller)?
        }
        Step::BalanceOf { account } => return Ok(Outcome::value(escrow.balance_of(account))),
        Step::BalanceOfAt { account, block } => {
            return Ok(Outcome::value(escrow.balance_of_at(account, *block)?));
        }
        Step::TotalSupply => return Ok(Outcome::value(escrow.total_supply())),
        Step::TotalSupplyAt { block } => return Ok(Outcome::value(escrow.total_supply_at(*block)?)),
    }
    Ok(Outcome::default())
}

/// Run one step and report its outcome together with the events it emitted.
pub fn run_step(escrow: &mut Escrow, index: usize, step: &Step) -> StepReport {
    let result = apply(escrow, step);
    let (value, caught_up, error) = match result {
        Ok(out) => (out.value, out.caught_up, None),
        Err(e) => {
            tracing::warn!(step = index, op = step.name(), error = %e, "script: step failed");
            (None, None, Some(e.to_string()))
        }
    };
    StepReport {
        step: index,
        op: step.name(),
        timestamp: escrow.clock().timestamp(),
        block: escrow.clock().block_number(),
        value,
        caught_up,
        error,
        events: escrow.take_events(),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HolderSummary {
    pub account: Address,
    pub amount: u128,
    pub end: u64,
    pub balance: u128,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub at: u64,
    pub slope: i128,
}

/// End-of-run snapshot of the ledger.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub timestamp: u64,
    pub block: u64,
    pub epoch: usize,
    pub supply: u128,
    pub total_supply: u128,
    pub global_unlocked: bool,
    pub controller: Address,
    pub holders: Vec<HolderSummary>,
    pub upcoming_expiries: Vec<Expiry>,
}

/// Summarize `escrow`, listing slope changes up to `horizon` seconds ahead.
pub fn summarize(escrow: &Escrow, horizon: u64) -> Summary {
    let now = escrow.clock().timestamp();
    let mut holders: Vec<HolderSummary> = escrow
        .holders()
        .map(|account| {
            let lock = escrow.locked(account);
            HolderSummary {
                account: *account,
                amount: lock.amount,
                end: lock.end,
                balance: escrow.balance_of(account),
            }
        })
        .collect();
    holders.sort_by_key(|h| h.account.as_bytes().to_owned());

    Summary {
        timestamp: now,
        block: escrow.clock().block_number(),
        epoch: escrow.epoch(),
        supply: escrow.supply(),
        total_supply: escrow.total_supply(),
        global_unlocked: escrow.global_unlocked(),
        controller: escrow.controller(),
        holders,
        upcoming_expiries: escrow
            .scheduled_expiries(now.saturating_add(horizon))
            .into_iter()
            .map(|(at, slope)| Expiry { at, slope })
            .collect(),
    }
}
