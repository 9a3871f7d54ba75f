//! Ledger constants. All durations are in seconds, all amounts in base units.

/// One whole token in base units (18 decimals).
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Seconds per day.
pub const DAY: u64 = 86_400;

/// Seconds per week. Lock end times and slope changes are aligned to it.
pub const WEEK: u64 = 7 * DAY;

/// Maximum lock duration: two years.
///
/// A lock of `amount` for `MAXTIME` starts with voting power `amount`
/// (minus rounding), so the per-second slope is `amount / MAXTIME`.
pub const MAXTIME: u64 = 2 * 365 * DAY;

/// Lower bound for the configurable minimum lock duration.
pub const MIN_LOCK_FLOOR: u64 = 2 * WEEK;

/// Maximum number of weekly steps a single forward fill may take (~5 years).
pub const MAX_FILL_WEEKS: usize = 255;

/// Fixed-point denominator for the blocks-per-second rate used when
/// interpolating block numbers of filled weekly points.
pub const BLOCK_SLOPE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Round a timestamp down to the start of its week.
///
/// # Examples
///
/// ```
/// use ebb_core::constants::{round_to_week, WEEK};
/// assert_eq!(round_to_week(0), 0);
/// assert_eq!(round_to_week(WEEK - 1), 0);
/// assert_eq!(round_to_week(3 * WEEK + 5), 3 * WEEK);
/// ```
pub const fn round_to_week(timestamp: u64) -> u64 {
    (timestamp / WEEK) * WEEK
}
