//! Finite domains, contract state models and traces.
//!
//! This crate defines the domain catalog and bounded arithmetic, the
//! [`TransitionSystem`](system::TransitionSystem) abstraction, the auction and
//! ballot rule sets, structurally shared execution traces, and the invariant
//! catalogs checked against them.

pub mod auction;
pub mod ballot;
pub mod domain;
pub mod properties;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod system;
pub mod trace;
