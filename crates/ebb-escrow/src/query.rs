//! Read-only history queries.
//!
//! Point-in-time answers come from a binary search over the checkpoint logs
//! followed by linear decay from the found point. Point-in-block answers
//! first map the block to a timestamp by interpolating between the two
//! global points that bracket it.
//!
//! The search primitives return index 0 when the query precedes every
//! entry. Callers must separately treat times before global entry 0 as
//! "no voting power" rather than trusting the index alone; the
//! [`HistoryQuery`] methods do this.

use ebb_core::constants::{MAX_FILL_WEEKS, WEEK, round_to_week};
use ebb_core::error::QueryError;
use ebb_core::types::{Address, Point};

use crate::checkpoint::Checkpointer;
use crate::history::{GlobalLog, UserLog};
use crate::slope::SlopeSchedule;

/// Greatest epoch `<= max_epoch` whose timestamp is `<= t`; 0 if none.
pub fn find_timestamp_epoch(points: &[Point], t: u64, max_epoch: usize) -> usize {
    last_at_or_before(points, max_epoch, t, |p| p.timestamp)
}

/// Greatest epoch `<= max_epoch` whose block is `<= block`; 0 if none.
pub fn find_block_epoch(points: &[Point], block: u64, max_epoch: usize) -> usize {
    last_at_or_before(points, max_epoch, block, |p| p.block)
}

/// Greatest user epoch of `account` whose timestamp is `<= t`.
///
/// Returns 0, the "never locked" sentinel, when `account` has no entry at or
/// before `t`.
pub fn find_user_timestamp_epoch(users: &UserLog, account: &Address, t: u64) -> usize {
    let points = users.points(account);
    if points.len() <= 1 {
        return 0;
    }
    // Skip the sentinel so its zero timestamp never matches.
    points[1..].partition_point(|p| p.timestamp <= t)
}

fn last_at_or_before(points: &[Point], max_epoch: usize, target: u64, key: impl Fn(&Point) -> u64) -> usize {
    if points.is_empty() {
        return 0;
    }
    let upto = max_epoch.min(points.len() - 1);
    points[..=upto]
        .partition_point(|p| key(p) <= target)
        .saturating_sub(1)
}

/// Total voting power at `t`, replaying forward from `point`.
///
/// Applies the same weekly decay and slope changes as a checkpoint but
/// never writes anything. After [`MAX_FILL_WEEKS`] steps the remaining
/// interval decays at the slope reached so far.
pub fn supply_at(point: &Point, t: u64, schedule: &SlopeSchedule) -> u128 {
    if t <= point.timestamp {
        return point.value_at(t);
    }
    let mut last = *point;
    let mut t_i = round_to_week(last.timestamp);
    for _ in 0..MAX_FILL_WEEKS {
        t_i = t_i.saturating_add(WEEK);
        let mut d_slope = 0;
        if t_i > t {
            t_i = t;
        } else {
            d_slope = schedule.get(t_i);
        }
        let elapsed = (t_i - last.timestamp) as i128;
        last.bias = last.bias.saturating_add(last.slope.saturating_mul(elapsed)).max(0);
        if t_i == t {
            return last.bias as u128;
        }
        last.slope = last.slope.saturating_add(d_slope).min(0);
        last.timestamp = t_i;
    }
    last.value_at(t)
}

/// Read-only view over the ledger's history at a fixed head.
#[derive(Clone, Copy, Debug)]
pub struct HistoryQuery<'a> {
    global: &'a GlobalLog,
    users: &'a UserLog,
    schedule: &'a SlopeSchedule,
    now: u64,
    head_block: u64,
}

impl<'a> HistoryQuery<'a> {
    /// View `checkpointer` as of `(now, head_block)`.
    pub fn new(checkpointer: &'a Checkpointer, now: u64, head_block: u64) -> Self {
        Self {
            global: checkpointer.global(),
            users: checkpointer.users(),
            schedule: checkpointer.schedule(),
            now,
            head_block,
        }
    }

    /// Whether `t` precedes the ledger's first checkpoint.
    fn before_genesis(&self, t: u64) -> bool {
        t < self.global.first().timestamp
    }

    /// Voting power of `account` at `t`. Future `t` projects the decay.
    pub fn balance_of_at_t(&self, account: &Address, t: u64) -> u128 {
        if self.before_genesis(t) {
            return 0;
        }
        let epoch = find_user_timestamp_epoch(self.users, account, t);
        if epoch == 0 {
            return 0;
        }
        self.users
            .get(account, epoch)
            .map_or(0, |p| p.value_at(t))
    }

    /// Total voting power at `t`.
    pub fn total_supply_at_t(&self, t: u64) -> u128 {
        if self.before_genesis(t) {
            return 0;
        }
        let epoch = find_timestamp_epoch(self.global.points(), t, self.global.epoch());
        self.global
            .get(epoch)
            .map_or(0, |p| supply_at(p, t, self.schedule))
    }

    /// Voting power of `account` at `block`.
    ///
    /// # Errors
    ///
    /// [`QueryError::FutureBlock`] if `block` is beyond the current head.
    pub fn balance_of_at(&self, account: &Address, block: u64) -> Result<u128, QueryError> {
        Ok(self
            .block_timestamp(block)?
            .map_or(0, |t| self.balance_of_at_t(account, t)))
    }

    /// Total voting power at `block`.
    ///
    /// # Errors
    ///
    /// [`QueryError::FutureBlock`] if `block` is beyond the current head.
    pub fn total_supply_at(&self, block: u64) -> Result<u128, QueryError> {
        Ok(self
            .block_timestamp(block)?
            .map_or(0, |t| self.total_supply_at_t(t)))
    }

    /// Estimated timestamp of `block`, or `None` if it precedes the ledger.
    ///
    /// Interpolates linearly between the two global points bracketing
    /// `block`; past the last point, between it and the current head.
    ///
    /// # Errors
    ///
    /// [`QueryError::FutureBlock`] if `block` is beyond the current head.
    pub fn block_timestamp(&self, block: u64) -> Result<Option<u64>, QueryError> {
        if block > self.head_block {
            return Err(QueryError::FutureBlock { requested: block, head: self.head_block });
        }
        if block < self.global.first().block {
            return Ok(None);
        }
        if block == self.head_block {
            return Ok(Some(self.now));
        }

        let max_epoch = self.global.epoch();
        let epoch = find_block_epoch(self.global.points(), block, max_epoch);
        let p0 = self.global.points()[epoch];
        let (d_block, d_t) = match self.global.get(epoch + 1) {
            Some(p1) => (p1.block - p0.block, p1.timestamp - p0.timestamp),
            None => (
                self.head_block.saturating_sub(p0.block),
                self.now.saturating_sub(p0.timestamp),
            ),
        };

        let mut t = p0.timestamp;
        if d_block != 0 {
            let offset = u128::from(d_t) * u128::from(block - p0.block) / u128::from(d_block);
            t += offset as u64;
        }
        Ok(Some(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::LockDelta;
    use ebb_core::constants::{MAXTIME, UNIT};
    use ebb_core::types::LockedBalance;
    use proptest::prelude::*;

    const T0: u64 = 1_000 * WEEK;

    fn pts(timestamps: &[u64]) -> Vec<Point> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, &t)| Point { bias: 0, slope: 0, timestamp: t, block: i as u64 * 10 })
            .collect()
    }

    fn alice() -> Address {
        Address::from_seed(0xA1)
    }

    fn lock_at(cp: &mut Checkpointer, account: Address, amount: u128, end: u64, now: u64, block: u64) {
        let plan = cp
            .plan(&LockDelta { account, old: LockedBalance::EMPTY, new: LockedBalance { amount, end } }, now, block)
            .unwrap();
        cp.commit(plan);
    }

    // ------------------------------------------------------------------
    // search
    // ------------------------------------------------------------------

    #[test]
    fn timestamp_search_finds_greatest_at_or_before() {
        let p = pts(&[100, 200, 200, 300]);
        assert_eq!(find_timestamp_epoch(&p, 50, 3), 0);
        assert_eq!(find_timestamp_epoch(&p, 100, 3), 0);
        assert_eq!(find_timestamp_epoch(&p, 199, 3), 0);
        assert_eq!(find_timestamp_epoch(&p, 200, 3), 2);
        assert_eq!(find_timestamp_epoch(&p, 1_000, 3), 3);
    }

    #[test]
    fn timestamp_search_respects_max_epoch() {
        let p = pts(&[100, 200, 300]);
        assert_eq!(find_timestamp_epoch(&p, 1_000, 1), 1);
        assert_eq!(find_timestamp_epoch(&p, 1_000, 99), 2);
    }

    #[test]
    fn search_on_empty_is_zero() {
        assert_eq!(find_timestamp_epoch(&[], 5, 0), 0);
        assert_eq!(find_block_epoch(&[], 5, 0), 0);
    }

    #[test]
    fn block_search() {
        let p = pts(&[100, 200, 300]);
        assert_eq!(find_block_epoch(&p, 0, 2), 0);
        assert_eq!(find_block_epoch(&p, 15, 2), 1);
        assert_eq!(find_block_epoch(&p, 20, 2), 2);
    }

    #[test]
    fn user_search_skips_sentinel() {
        let mut users = UserLog::new();
        let a = alice();
        assert_eq!(find_user_timestamp_epoch(&users, &a, u64::MAX), 0);
        users.push(a, Point { bias: 1, slope: 0, timestamp: 100, block: 1 });
        users.push(a, Point { bias: 2, slope: 0, timestamp: 200, block: 2 });
        assert_eq!(find_user_timestamp_epoch(&users, &a, 0), 0);
        assert_eq!(find_user_timestamp_epoch(&users, &a, 99), 0);
        assert_eq!(find_user_timestamp_epoch(&users, &a, 100), 1);
        assert_eq!(find_user_timestamp_epoch(&users, &a, 250), 2);
    }

    proptest! {
        #[test]
        fn timestamp_search_is_monotone(
            mut ts in proptest::collection::vec(0u64..10_000, 1..40),
            a in 0u64..12_000,
            b in 0u64..12_000,
        ) {
            ts.sort_unstable();
            let p = pts(&ts);
            let max = p.len() - 1;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(find_timestamp_epoch(&p, lo, max) <= find_timestamp_epoch(&p, hi, max));
        }

        #[test]
        fn timestamp_search_result_is_tight(
            mut ts in proptest::collection::vec(0u64..10_000, 1..40),
            t in 0u64..12_000,
        ) {
            ts.sort_unstable();
            let p = pts(&ts);
            let e = find_timestamp_epoch(&p, t, p.len() - 1);
            if p[0].timestamp <= t {
                prop_assert!(p[e].timestamp <= t);
            }
            if e + 1 < p.len() {
                prop_assert!(p[e + 1].timestamp > t);
            }
        }
    }

    // ------------------------------------------------------------------
    // supply_at
    // ------------------------------------------------------------------

    #[test]
    fn supply_at_applies_expiries() {
        let mut schedule = SlopeSchedule::new();
        schedule.set(T0 + 2 * WEEK, 3);
        let p = Point { bias: 3 * 4 * WEEK as i128, slope: -3, timestamp: T0, block: 0 };
        assert_eq!(supply_at(&p, T0 + WEEK, &schedule), 3 * 3 * WEEK as u128);
        assert_eq!(supply_at(&p, T0 + 2 * WEEK, &schedule), 3 * 2 * WEEK as u128);
        // Slope stops at the expiry.
        assert_eq!(supply_at(&p, T0 + 10 * WEEK, &schedule), 3 * 2 * WEEK as u128);
    }

    #[test]
    fn supply_at_before_point_is_bias() {
        let p = Point { bias: 10, slope: -1, timestamp: T0, block: 0 };
        assert_eq!(supply_at(&p, T0, &SlopeSchedule::new()), 10);
        assert_eq!(supply_at(&p, T0 - 1, &SlopeSchedule::new()), 10);
    }

    #[test]
    fn supply_at_floors_at_zero() {
        let p = Point { bias: 10, slope: -1, timestamp: T0, block: 0 };
        assert_eq!(supply_at(&p, T0 + 3 * WEEK, &SlopeSchedule::new()), 0);
    }

    // ------------------------------------------------------------------
    // HistoryQuery
    // ------------------------------------------------------------------

    #[test]
    fn queries_before_genesis_are_zero() {
        let mut cp = Checkpointer::new(T0, 100);
        lock_at(&mut cp, alice(), 100 * UNIT, T0 + 10 * WEEK, T0, 100);
        let q = HistoryQuery::new(&cp, T0 + WEEK, 150);
        assert_eq!(q.balance_of_at_t(&alice(), T0 - 1), 0);
        assert_eq!(q.total_supply_at_t(T0 - 1), 0);
        assert_eq!(q.balance_of_at(&alice(), 99).unwrap(), 0);
        assert_eq!(q.total_supply_at(99).unwrap(), 0);
    }

    #[test]
    fn future_block_rejected() {
        let cp = Checkpointer::new(T0, 100);
        let q = HistoryQuery::new(&cp, T0 + 60, 105);
        assert_eq!(
            q.balance_of_at(&alice(), 106),
            Err(QueryError::FutureBlock { requested: 106, head: 105 })
        );
        assert!(q.total_supply_at(106).is_err());
        assert!(q.total_supply_at(105).is_ok());
    }

    #[test]
    fn block_timestamp_interpolates_between_points() {
        let mut cp = Checkpointer::new(T0, 0);
        lock_at(&mut cp, alice(), UNIT, T0 + 10 * WEEK, T0 + 1_000, 100);
        let q = HistoryQuery::new(&cp, T0 + 3_000, 200);
        assert_eq!(q.block_timestamp(0).unwrap(), Some(T0));
        assert_eq!(q.block_timestamp(50).unwrap(), Some(T0 + 500));
        assert_eq!(q.block_timestamp(100).unwrap(), Some(T0 + 1_000));
        // Past the last point: interpolate towards the head.
        assert_eq!(q.block_timestamp(150).unwrap(), Some(T0 + 2_000));
        assert_eq!(q.block_timestamp(200).unwrap(), Some(T0 + 3_000));
    }

    #[test]
    fn block_timestamp_with_idle_blocks() {
        let cp = Checkpointer::new(T0, 10);
        // Time advanced without any blocks since genesis.
        let q = HistoryQuery::new(&cp, T0 + 500, 10);
        assert_eq!(q.block_timestamp(10).unwrap(), Some(T0 + 500));
    }

    #[test]
    fn balance_decays_linearly() {
        let mut cp = Checkpointer::new(T0, 0);
        let amount = 1_000 * UNIT;
        let end = T0 + 100 * WEEK;
        lock_at(&mut cp, alice(), amount, end, T0, 0);
        let q = HistoryQuery::new(&cp, T0, 0);

        let rate = amount / MAXTIME as u128;
        assert_eq!(q.balance_of_at_t(&alice(), T0), rate * (100 * WEEK) as u128);
        assert_eq!(q.balance_of_at_t(&alice(), T0 + 50 * WEEK), rate * (50 * WEEK) as u128);
        assert_eq!(q.balance_of_at_t(&alice(), end), 0);
        assert_eq!(q.balance_of_at_t(&alice(), end + 1), 0);
    }

    #[test]
    fn total_supply_matches_single_balance() {
        let mut cp = Checkpointer::new(T0, 0);
        lock_at(&mut cp, alice(), 1_000 * UNIT, T0 + 30 * WEEK, T0 + 77, 3);
        let q = HistoryQuery::new(&cp, T0 + 77, 3);
        for w in [0, 1, 5, 29, 30, 31] {
            let t = T0 + 77 + w * WEEK;
            assert_eq!(q.total_supply_at_t(t), q.balance_of_at_t(&alice(), t), "week {w}");
        }
    }
}
