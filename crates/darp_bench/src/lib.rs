//! Example matching algorithms and scenario scaffolding that exercise the
//! `darp_core` harness.
//!
//! `darp_core` deliberately does not prescribe a matching policy; this crate is the
//! driver crate sitting alongside the simulation core, used for benches, integration
//! tests, and the `darp-bench` binary's default run. `greedy` and `nearest_neighbor`
//! are example clients of `sop_insert`/the feasibility kernel, not a prescribed policy.

pub mod greedy;
pub mod nearest_neighbor;
pub mod scenario;
