//! Scenario, property, and adversarial test suite for the Ebb ledger.
//!
//! The integration tests under `tests/` drive a [`VotingEscrow`] over a
//! manual clock and an in-memory vault, checking end-to-end lock lifecycles,
//! decay invariants under randomized inputs, and attack paths around
//! permissions, atomicity, and stale checkpoints.
//!
//! [`VotingEscrow`]: ebb_escrow::VotingEscrow

pub mod helpers;
