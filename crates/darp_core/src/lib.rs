//! Simulation engine and matching-support primitives for dynamic ridesharing (DARP-like)
//! benchmarking.
//!
//! This crate is the core: a time-stepped simulation loop (`engine`), the transactional
//! fleet store every thread shares (`store`), the shared-ride insertion kernel
//! (`insertion::sop_insert`), the feasibility kernel (`feasibility::{chktw, chkcap,
//! chkpc}`), a grid spatial index for candidate retrieval (`grid`), and the algorithm
//! harness that binds a pluggable matching policy to the batch loop (`harness`).
//!
//! Concrete matching heuristics are not part of this crate — see the `darp-bench`
//! binary's `greedy`/`nearest_neighbor` modules for example clients that compose these
//! primitives into an actual policy.

pub mod clock;
pub mod engine;
pub mod error;
pub mod feasibility;
pub mod formats;
pub mod grid;
pub mod harness;
pub mod ids;
pub mod insertion;
pub mod network;
pub mod options;
pub mod store;
pub mod telemetry;
pub mod trip;

pub use engine::Engine;
pub use error::{ConfigError, FormatError};
pub use harness::{Harness, HarnessContext, RsAlgorithm};
pub use ids::{CustId, EdgeId, Load, Meters, NodeId, Tick, TripId, VehlId};
pub use network::{GtreeOracle, RoadNetwork, ShortestPathOracle};
pub use options::Options;
pub use store::FleetStore;
pub use trip::{Customer, CustomerStatus, Route, Schedule, Stop, StopType, Trip, Vehicle, VehicleStatus};
