//! Error types for the Ebb ledger.
//!
//! Every error aborts the whole operation that raised it; the ledger never
//! applies a partial state change.
use thiserror::Error;

use crate::types::Address;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("asset address is zero")] ZeroAsset,
    #[error("admin address is zero")] ZeroAdmin,
    #[error("min lock duration too short: {got} < {floor}")] MinLockTooShort { got: u64, floor: u64 },
    #[error("min lock duration too long: {got} > {max}")] MinLockTooLong { got: u64, max: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockStateError {
    #[error("no existing lock for {0}")] NoLock(Address),
    #[error("lock already exists for {0}; withdraw first")] LockExists(Address),
    #[error("lock not expired: ends at {end}, now {now}")] NotExpired { end: u64, now: u64 },
    #[error("lock expired at {end}, now {now}")] Expired { end: u64, now: u64 },
    #[error("zero value")] ZeroValue,
    #[error("neither amount nor unlock time given")] NothingToChange,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeOrderingError {
    #[error("unlock time {requested} not after current end {current}")] NotLater { current: u64, requested: u64 },
    #[error("lock duration too short: {duration} < {min}")] TooShort { duration: u64, min: u64 },
    #[error("lock duration too long: {duration} > {max}")] TooLong { duration: u64, max: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("contract {0} is not whitelisted")] ContractNotWhitelisted(Address),
    #[error("{0} is not the admin")] NotAdmin(Address),
    #[error("{0} is not the controller")] NotController(Address),
    #[error("ledger is globally unlocked")] GloballyUnlocked,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("block {requested} is beyond the current head {head}")] FutureBlock { requested: u64, head: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("insufficient balance for {account}: have {have}, need {need}")] InsufficientBalance { account: Address, have: u128, need: u128 },
    #[error("escrow holds {have}, cannot release {need}")] InsufficientEscrow { have: u128, need: u128 },
    #[error("balance overflow")] Overflow,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] LockState(#[from] LockStateError),
    #[error(transparent)] TimeOrdering(#[from] TimeOrderingError),
    #[error(transparent)] Permission(#[from] PermissionError),
    #[error(transparent)] Query(#[from] QueryError),
    #[error(transparent)] Asset(#[from] AssetError),
    #[error("forward fill needs more than {max_weeks} weekly steps; call checkpoint() to catch up")] ForwardFillLimit { max_weeks: usize },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}
