//! Bounded trace exploration and invariant checking.
//!
//! This crate drives a [`TransitionSystem`](tracecheck_ir::system::TransitionSystem)
//! through every execution trace within a length bound, checks named
//! invariants along the way, replays counterexamples, and packages the
//! verdicts for reporting.

pub mod checker;
pub mod config;
pub mod control;
pub mod error;
pub mod explorer;
pub mod replay;
pub mod result;
