//! The write path: forward fill of the global log and per-lock checkpoints.
//!
//! A checkpoint runs in two phases. [`Checkpointer::plan`] is pure: it
//! replays the global log from its last entry to "now" in weekly steps,
//! applies the lock change, and collects every append and schedule update
//! into a [`CheckpointPlan`]. [`Checkpointer::commit`] then applies the plan
//! and cannot fail. The caller performs any fallible side effect (asset
//! transfers) between the two, so a failure anywhere leaves the ledger
//! untouched.
//!
//! The replay is capped at [`MAX_FILL_WEEKS`] steps. A lock mutation that
//! would need more aborts with [`LedgerError::ForwardFillLimit`]; a plain
//! [`Checkpointer::plan_checkpoint`] persists the partial progress instead,
//! so repeated calls always catch the ledger up.

use ebb_core::constants::{BLOCK_SLOPE_PRECISION, MAX_FILL_WEEKS, WEEK, round_to_week};
use ebb_core::error::LedgerError;
use ebb_core::types::{Address, LockedBalance, Point};
use tracing::{debug, warn};

use crate::history::{GlobalLog, UserLog};
use crate::slope::SlopeSchedule;

/// Result of replaying the global log forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    /// Intermediate weekly points strictly before `now`.
    pub filled: Vec<Point>,
    /// The point at `now`, or `None` if the step cap was hit first.
    pub head: Option<Point>,
}

/// Replay `last` forward to `now` in week-aligned steps.
///
/// Each step decays the running point by `slope * step`, then adds any
/// slope change scheduled exactly at the step boundary. Block numbers of
/// intermediate steps are interpolated from the blocks-per-second rate
/// between `last` and `(now, block)`; the final point carries `block`
/// exactly. Bias is clamped at zero and slope at zero from below.
pub fn fill_forward(
    last: &Point,
    schedule: &SlopeSchedule,
    now: u64,
    block: u64,
    max_weeks: usize,
) -> Fill {
    let initial = *last;
    let now = now.max(initial.timestamp);
    let block = block.max(initial.block);

    let block_slope = if now > initial.timestamp {
        BLOCK_SLOPE_PRECISION * u128::from(block - initial.block)
            / u128::from(now - initial.timestamp)
    } else {
        0
    };

    let mut point = initial;
    let mut filled = Vec::new();
    let mut t_i = round_to_week(initial.timestamp);

    for _ in 0..max_weeks {
        t_i = t_i.saturating_add(WEEK);
        let mut d_slope = 0;
        if t_i > now {
            t_i = now;
        } else {
            d_slope = schedule.get(t_i);
        }

        let elapsed = (t_i - point.timestamp) as i128;
        point.bias = point
            .bias
            .saturating_add(point.slope.saturating_mul(elapsed))
            .max(0);
        point.slope = point.slope.saturating_add(d_slope).min(0);
        point.timestamp = t_i;

        if t_i == now {
            point.block = block;
            return Fill { filled, head: Some(point) };
        }

        let blocks = block_slope.saturating_mul(u128::from(t_i - initial.timestamp))
            / BLOCK_SLOPE_PRECISION;
        point.block = initial.block + blocks as u64;
        filled.push(point);
    }

    Fill { filled, head: None }
}

/// A lock record transition for one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockDelta {
    pub account: Address,
    pub old: LockedBalance,
    pub new: LockedBalance,
}

/// Every mutation a checkpoint will apply, computed without side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointPlan {
    filled: Vec<Point>,
    head: Option<Point>,
    slope_updates: Vec<(u64, i128)>,
    user: Option<(Address, Point)>,
    supply: u128,
}

impl CheckpointPlan {
    /// Number of global entries the plan appends.
    pub fn appends(&self) -> usize {
        self.filled.len() + usize::from(self.head.is_some())
    }
}

/// Outcome of a committed checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Committed {
    pub previous_supply: u128,
    pub supply: u128,
    /// Global epoch of the last appended point.
    pub epoch: usize,
    /// Whether the global log now reaches "now".
    pub caught_up: bool,
}

/// Owner of every running total: both checkpoint logs, the slope schedule,
/// and the nominal supply. Only checkpoints mutate them.
#[derive(Clone, Debug)]
pub struct Checkpointer {
    global: GlobalLog,
    users: UserLog,
    schedule: SlopeSchedule,
    supply: u128,
}

impl Checkpointer {
    /// Start with the all-zero global point at `(timestamp, block)`.
    pub fn new(timestamp: u64, block: u64) -> Self {
        Self {
            global: GlobalLog::new(Point::zero_at(timestamp, block)),
            users: UserLog::new(),
            schedule: SlopeSchedule::new(),
            supply: 0,
        }
    }

    pub fn global(&self) -> &GlobalLog {
        &self.global
    }

    pub fn users(&self) -> &UserLog {
        &self.users
    }

    pub fn schedule(&self) -> &SlopeSchedule {
        &self.schedule
    }

    /// Nominal sum of all locked amounts.
    pub fn supply(&self) -> u128 {
        self.supply
    }

    /// Plan a permissionless global checkpoint. Never fails; if the step cap
    /// is hit, the plan carries only the weekly points it reached.
    pub fn plan_checkpoint(&self, now: u64, block: u64) -> CheckpointPlan {
        let fill = fill_forward(self.global.last(), &self.schedule, now, block, MAX_FILL_WEEKS);
        if fill.head.is_none() {
            warn!(
                steps = fill.filled.len(),
                "checkpoint: forward fill capped, ledger still behind"
            );
        }
        CheckpointPlan {
            filled: fill.filled,
            head: fill.head,
            slope_updates: Vec::new(),
            user: None,
            supply: self.supply,
        }
    }

    /// Plan the checkpoint for a lock transition.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ForwardFillLimit`] if the global log is more than
    ///   [`MAX_FILL_WEEKS`] weeks behind `now`
    /// - [`LedgerError::ArithmeticOverflow`] if an amount does not fit the
    ///   signed decay representation or the supply overflows
    pub fn plan(&self, delta: &LockDelta, now: u64, block: u64) -> Result<CheckpointPlan, LedgerError> {
        let Fill { filled, head } =
            fill_forward(self.global.last(), &self.schedule, now, block, MAX_FILL_WEEKS);
        let Some(mut head) = head else {
            warn!(account = %delta.account, "checkpoint: forward fill limit exceeded");
            return Err(LedgerError::ForwardFillLimit { max_weeks: MAX_FILL_WEEKS });
        };

        let (old_bias, old_slope) = delta.old.decay_at(now).ok_or(LedgerError::ArithmeticOverflow)?;
        let (new_bias, new_slope) = delta.new.decay_at(now).ok_or(LedgerError::ArithmeticOverflow)?;

        head.slope = head
            .slope
            .checked_add(new_slope - old_slope)
            .ok_or(LedgerError::ArithmeticOverflow)?
            .min(0);
        head.bias = head
            .bias
            .checked_add(new_bias - old_bias)
            .ok_or(LedgerError::ArithmeticOverflow)?
            .max(0);

        // The schedule stores -slope per expiry, so removing a lock's share
        // adds its (negative) slope back.
        let mut slope_updates = Vec::with_capacity(2);
        if delta.old.end > now {
            let mut d = self.schedule.get(delta.old.end) + old_slope;
            if delta.new.end == delta.old.end {
                d -= new_slope;
            }
            slope_updates.push((delta.old.end, d));
        }
        if delta.new.end > now && delta.new.end > delta.old.end {
            slope_updates.push((delta.new.end, self.schedule.get(delta.new.end) - new_slope));
        }

        let supply = self
            .supply
            .checked_sub(delta.old.amount)
            .and_then(|s| s.checked_add(delta.new.amount))
            .ok_or(LedgerError::ArithmeticOverflow)?;

        let user = Point { bias: new_bias, slope: new_slope, timestamp: now, block: head.block };

        debug!(
            account = %delta.account,
            filled = filled.len(),
            bias = head.bias,
            slope = head.slope,
            "checkpoint: planned"
        );

        Ok(CheckpointPlan {
            filled,
            head: Some(head),
            slope_updates,
            user: Some((delta.account, user)),
            supply,
        })
    }

    /// Apply a plan produced by this checkpointer.
    pub fn commit(&mut self, plan: CheckpointPlan) -> Committed {
        let previous_supply = self.supply;
        for point in plan.filled {
            self.global.push(point);
        }
        let caught_up = plan.head.is_some();
        if let Some(head) = plan.head {
            self.global.push(head);
        }
        for (t, delta) in plan.slope_updates {
            debug!(at = t, delta, "checkpoint: slope change updated");
            self.schedule.set(t, delta);
        }
        if let Some((account, point)) = plan.user {
            self.users.push(account, point);
        }
        self.supply = plan.supply;
        Committed {
            previous_supply,
            supply: self.supply,
            epoch: self.global.epoch(),
            caught_up,
        }
    }
}
