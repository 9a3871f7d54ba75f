//! Slope-change schedule.
//!
//! A sparse table keyed by week-aligned expiry time. The value at `t` is the
//! aggregate amount added to the global slope when replay crosses `t`: the
//! sum of `-slope` over every lock ending at `t`, so it is never negative
//! for a consistent ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SlopeSchedule {
    changes: BTreeMap<u64, i128>,
}

impl SlopeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduled slope delta at `t` (zero if none).
    pub fn get(&self, t: u64) -> i128 {
        self.changes.get(&t).copied().unwrap_or(0)
    }

    /// Overwrite the delta at `t`. A zero delta removes the entry.
    pub fn set(&mut self, t: u64, delta: i128) {
        if delta == 0 {
            self.changes.remove(&t);
        } else {
            self.changes.insert(t, delta);
        }
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Entries with `from < t <= to`, in time order.
    pub fn between(&self, from: u64, to: u64) -> impl Iterator<Item = (u64, i128)> + '_ {
        let start = from.saturating_add(1);
        let range = if start <= to {
            self.changes.range(start..=to)
        } else {
            self.changes.range(0..0)
        };
        range.map(|(t, d)| (*t, *d))
    }
}
