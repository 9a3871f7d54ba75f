//! Append-only checkpoint logs.
//!
//! Both logs are index-addressed arrays; an epoch is just an index. Entries
//! are never rewritten or removed, and within one log timestamps and block
//! numbers are non-decreasing.

use std::collections::HashMap;

use ebb_core::types::{Address, Point};

/// Global decay history. Epoch 0 is the all-zero point recorded when the
/// ledger was constructed, so the log is never empty.
#[derive(Clone, Debug)]
pub struct GlobalLog {
    points: Vec<Point>,
}

impl GlobalLog {
    /// Start a log at `genesis`.
    pub fn new(genesis: Point) -> Self {
        Self { points: vec![genesis] }
    }

    /// Index of the latest entry.
    pub fn epoch(&self) -> usize {
        self.points.len() - 1
    }

    pub fn get(&self, epoch: usize) -> Option<&Point> {
        self.points.get(epoch)
    }

    /// Entry 0.
    pub fn first(&self) -> &Point {
        &self.points[0]
    }

    /// The latest entry.
    pub fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    pub fn push(&mut self, point: Point) {
        debug_assert!(point.timestamp >= self.last().timestamp, "global log out of order");
        debug_assert!(point.block >= self.last().block, "global log out of order");
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

/// Per-account decay history.
///
/// Index 0 of every account's log is an empty sentinel meaning "never
/// locked"; real entries start at user epoch 1.
#[derive(Clone, Debug, Default)]
pub struct UserLog {
    logs: HashMap<Address, Vec<Point>>,
}

impl UserLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest user epoch for `account`; zero if it never locked.
    pub fn epoch(&self, account: &Address) -> usize {
        self.logs.get(account).map_or(0, |log| log.len() - 1)
    }

    /// Entry at `epoch`. Epoch 0 yields the sentinel for any account.
    pub fn get(&self, account: &Address, epoch: usize) -> Option<Point> {
        if epoch == 0 {
            return Some(Point::default());
        }
        self.logs.get(account)?.get(epoch).copied()
    }

    /// Latest real entry, if any.
    pub fn last(&self, account: &Address) -> Option<&Point> {
        self.logs.get(account).and_then(|log| log[1..].last())
    }

    /// Append `point` and return the new user epoch.
    pub fn push(&mut self, account: Address, point: Point) -> usize {
        let log = self.logs.entry(account).or_insert_with(|| vec![Point::default()]);
        debug_assert!(
            log.len() == 1 || point.timestamp >= log[log.len() - 1].timestamp,
            "user log out of order"
        );
        log.push(point);
        log.len() - 1
    }

    /// The full log for `account` including the sentinel; empty if it never
    /// locked.
    pub fn points(&self, account: &Address) -> &[Point] {
        self.logs.get(account).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of accounts that have ever locked.
    pub fn accounts(&self) -> usize {
        self.logs.len()
    }
}
