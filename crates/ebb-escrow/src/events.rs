//! Observable ledger events.
//!
//! The ledger buffers events in order of emission; consumers drain them with
//! [`VotingEscrow::take_events`](crate::VotingEscrow::take_events).

use ebb_core::types::Address;
use serde::{Deserialize, Serialize};

/// The kind of lock mutation behind a [`LedgerEvent::Deposit`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    /// Third party topped up an existing lock.
    DepositFor,
    /// Fresh lock.
    CreateLock,
    /// Owner added to their lock.
    IncreaseAmount,
    /// Owner pushed their unlock time later.
    IncreaseUnlockTime,
    /// Owner added funds and pushed the unlock time in one call.
    IncreaseAmountAndTime,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Deposit {
        account: Address,
        value: u128,
        unlock_time: u64,
        action: LockAction,
        timestamp: u64,
    },
    Withdraw {
        account: Address,
        value: u128,
        timestamp: u64,
    },
    Supply {
        previous: u128,
        current: u128,
    },
    WhitelistAdded {
        contract: Address,
    },
    WhitelistRemoved {
        contract: Address,
    },
    GlobalUnlock {
        timestamp: u64,
    },
    ControllerChanged {
        previous: Address,
        current: Address,
    },
}
