//! Core ledger types: addresses, decay points, lock records, callers.
//!
//! `bias` and `slope` are signed (`i128`); amounts are unsigned (`u128`).
//! Timestamps and block numbers are `u64`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::MAXTIME;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid admin or asset.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Address with every byte set to `seed`. Handy for fixtures.
    pub fn from_seed(seed: u8) -> Self {
        Self([seed; 20])
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A recorded decay snapshot.
///
/// Voting power at time `t >= timestamp` is `bias + slope * (t - timestamp)`,
/// floored at zero. `slope` is never positive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Point {
    /// Voting power at `timestamp`.
    pub bias: i128,
    /// Rate of change of `bias` per second (`<= 0`).
    pub slope: i128,
    /// When the point was recorded.
    pub timestamp: u64,
    /// Block number at `timestamp` (interpolated for filled weekly points).
    pub block: u64,
}

impl Point {
    /// The all-zero point at the given time and block.
    pub fn zero_at(timestamp: u64, block: u64) -> Self {
        Self { bias: 0, slope: 0, timestamp, block }
    }

    /// Voting power at `t`, floored at zero.
    ///
    /// Times before `timestamp` are treated as `timestamp` (no extrapolation
    /// into the past).
    ///
    /// # Examples
    ///
    /// ```
    /// use ebb_core::types::Point;
    /// let p = Point { bias: 100, slope: -1, timestamp: 10, block: 1 };
    /// assert_eq!(p.value_at(10), 100);
    /// assert_eq!(p.value_at(60), 50);
    /// assert_eq!(p.value_at(500), 0);
    /// ```
    pub fn value_at(&self, t: u64) -> u128 {
        let dt = t.saturating_sub(self.timestamp) as i128;
        let v = self.bias.saturating_add(self.slope.saturating_mul(dt));
        v.max(0) as u128
    }
}

/// A per-account lock record.
///
/// `end` is zero when there is no lock, otherwise a week-aligned timestamp.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LockedBalance {
    /// Locked amount in base units.
    pub amount: u128,
    /// Unlock time, or zero.
    pub end: u64,
}

impl LockedBalance {
    /// The empty record (`NO_LOCK`).
    pub const EMPTY: Self = Self { amount: 0, end: 0 };

    /// Whether any amount is still held (active or expired but not withdrawn).
    pub fn exists(&self) -> bool {
        self.amount > 0
    }

    /// Held and not yet at its unlock time.
    pub fn is_active(&self, now: u64) -> bool {
        self.exists() && self.end > now
    }

    /// Held and at or past its unlock time.
    pub fn is_expired(&self, now: u64) -> bool {
        self.exists() && self.end <= now
    }

    /// The `(bias, slope)` this lock contributes at `now`.
    ///
    /// `slope = -(amount / MAXTIME)` and `bias = -slope * (end - now)` while
    /// active; both zero otherwise. Returns `None` if the amount does not fit
    /// the signed representation.
    pub fn decay_at(&self, now: u64) -> Option<(i128, i128)> {
        if !self.is_active(now) {
            return Some((0, 0));
        }
        let rate = i128::try_from(self.amount / MAXTIME as u128).ok()?;
        let slope = -rate;
        let bias = rate.checked_mul((self.end - now) as i128)?;
        Some((bias, slope))
    }
}

/// The origin of a mutating call.
///
/// `sender` is the immediate caller; `origin` is the externally-owned
/// account that started the call chain. They differ when a contract calls
/// the ledger.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Caller {
    pub sender: Address,
    pub origin: Address,
}

impl Caller {
    /// A direct call from an externally-owned account.
    pub fn account(address: Address) -> Self {
        Self { sender: address, origin: address }
    }

    /// A call from `contract`, initiated by `origin`.
    pub fn contract(contract: Address, origin: Address) -> Self {
        Self { sender: contract, origin }
    }

    /// Whether the immediate caller is a contract.
    pub fn is_contract(&self) -> bool {
        self.sender != self.origin
    }
}
