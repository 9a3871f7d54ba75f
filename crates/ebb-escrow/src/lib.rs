//! # ebb-escrow — Time-weighted vote-escrow ledger.
//!
//! Accounts lock an asset until a week-aligned unlock time and receive
//! voting power that decays linearly to zero at that time. All arithmetic
//! is integer-only.
//!
//! - **Locks**: one lock record per account, validated in [`lock`].
//! - **Checkpoints**: append-only global and per-user logs of decay points,
//!   replayed forward in weekly steps ([`checkpoint`], [`history`]).
//! - **Slope schedule**: scheduled slope changes at lock expiries ([`slope`]).
//! - **Queries**: voting power and total supply at any past or current time
//!   or block ([`query`]).
//! - **Ledger**: [`VotingEscrow`] ties the above to an injected clock and
//!   asset vault, and buffers [`LedgerEvent`]s.

pub mod checkpoint;
pub mod config;
pub mod escrow;
pub mod events;
pub mod history;
pub mod lock;
pub mod query;
pub mod slope;

pub use config::EscrowConfig;
pub use escrow::VotingEscrow;
pub use events::{LedgerEvent, LockAction};
pub use lock::LockState;
pub use query::HistoryQuery;
