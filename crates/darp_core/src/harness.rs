//! Algorithm harness: the batch loop a matching algorithm plugs into.
//!
//! Named after `original_source/include/libcargo/rsalgorithm.h`'s `RSAlgorithm`
//! abstract class. Only `listen()`'s loop body is fixed; everything else is a default
//! no-op override point, matching the original's documented contract. Generalized to a
//! multi-method lifecycle (`handle_vehicle`/`handle_customer`/`match_batch`/`end`)
//! instead of a single `match_riders` call, plugged in as a `Box<dyn RsAlgorithm>`
//! resource the same way a `Box<dyn Trait>` matching-policy resource plugs in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::ids::{CustId, Tick, VehlId};
use crate::network::ShortestPathOracle;
use crate::store::{CommitRequest, FleetStore};
use crate::telemetry::{Event, EventLog};
use crate::trip::{Customer, Route, Schedule, Vehicle};

/// A pluggable matching algorithm. Default bodies are no-ops — an implementor
/// overrides only the hooks it needs, exactly like the original's RSAlgorithm: "only
/// `listen()` has a default behavior."
pub trait RsAlgorithm: Send {
    /// Called once per active vehicle per batch, before matching.
    fn handle_vehicle(&mut self, _vehicle: &Vehicle, _ctx: &HarnessContext<'_>) {}

    /// Called once per waiting customer per batch.
    fn handle_customer(&mut self, _customer: &Customer, _ctx: &HarnessContext<'_>) {}

    /// Called once per batch, after every `handle_vehicle`/`handle_customer` call.
    fn match_batch(&mut self, _ctx: &HarnessContext<'_>) {}

    /// Called once when the harness shuts down (cancellation or normal termination).
    fn end(&mut self, _ctx: &HarnessContext<'_>) {}
}

/// Everything a batch's hooks may need: the current tick, the fleet store, and the
/// shortest-path oracle, bundled so `handle_*`/`match_batch` don't need a dozen
/// parameters apiece.
pub struct HarnessContext<'a> {
    pub now: Tick,
    pub store: &'a FleetStore,
    pub oracle: &'a dyn ShortestPathOracle,
    pub vehicle_speed: crate::ids::Meters,
    done: &'a Arc<AtomicBool>,
    event_log: Option<&'a Arc<Mutex<EventLog>>>,
    /// `Options::strict_mode`: when set, `assign` rejects a commit whose route cost
    /// grows beyond the bound `FleetStore::try_commit` enforces (see
    /// `store::STRICT_MODE_COST_MULTIPLIER`).
    strict_mode: bool,
}

impl<'a> HarnessContext<'a> {
    /// Build a context directly, without going through [`Harness::run`]'s batch loop.
    /// Exists for algorithm crates' own test suites, which need a `HarnessContext` to
    /// exercise `handle_vehicle`/`handle_customer` without spinning up two threads.
    pub fn new(
        now: Tick,
        store: &'a FleetStore,
        oracle: &'a dyn ShortestPathOracle,
        vehicle_speed: crate::ids::Meters,
        done: &'a Arc<AtomicBool>,
    ) -> Self {
        Self {
            now,
            store,
            oracle,
            vehicle_speed,
            done,
            event_log: None,
            strict_mode: false,
        }
    }

    /// Attach an event log, so `assign`'s `R`/`M` lines get recorded. Exists for test
    /// suites built directly on [`HarnessContext::new`] rather than [`Harness::run`].
    pub fn with_event_log(mut self, log: &'a Arc<Mutex<EventLog>>) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Enable `Options::strict_mode` for commits built from this context.
    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    /// The commit primitive: propose a new route/schedule for `vehicle`, adding and
    /// removing the given customers. Returns `true` on success, `false` if the
    /// synchronize check rejected the proposal (see `store::FleetStore::try_commit`).
    pub fn assign(
        &self,
        vehicle: VehlId,
        cust_ids_to_add: Vec<CustId>,
        cust_ids_to_remove: Vec<CustId>,
        new_route: Route,
        new_schedule: Schedule,
    ) -> bool {
        let route_nodes: Vec<_> = new_route.data.iter().map(|w| w.node).collect();
        let accepted = self.store.try_commit(CommitRequest {
            vehicle,
            new_route,
            new_schedule,
            cust_ids_to_add: cust_ids_to_add.clone(),
            cust_ids_to_remove: cust_ids_to_remove.clone(),
            now: self.now,
            speed: self.vehicle_speed,
            strict_mode: self.strict_mode,
        });
        if !accepted {
            warn!(target: "harness", %vehicle, "commit rejected by synchronize check");
            return false;
        }
        if let Some(log) = self.event_log {
            let mut log = log.lock().expect("event log mutex poisoned");
            let _ = log.record(self.now, &Event::RouteCommitted { vehicle, nodes: route_nodes });
            let _ = log.record(
                self.now,
                &Event::MatchCommitted {
                    vehicle,
                    added: cust_ids_to_add,
                    removed: cust_ids_to_remove,
                },
            );
        }
        true
    }

    /// Stop the algorithm thread cooperatively. Equivalent to the original's
    /// `RSAlgorithm::kill()`: callable by the algorithm on itself.
    pub fn kill(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Drives an [`RsAlgorithm`] through repeated batches until `done` is set.
pub struct Harness {
    store: Arc<FleetStore>,
    oracle: Arc<dyn ShortestPathOracle>,
    done: Arc<AtomicBool>,
    batch_time_ticks: u64,
    tick_budget: Duration,
    vehicle_speed: crate::ids::Meters,
    event_log: Option<Arc<Mutex<EventLog>>>,
    strict_mode: bool,
    skip_delayed: bool,
    skip_assigned: bool,
}

impl Harness {
    pub fn new(
        store: Arc<FleetStore>,
        oracle: Arc<dyn ShortestPathOracle>,
        done: Arc<AtomicBool>,
        batch_time_ticks: u64,
        tick_budget: Duration,
        vehicle_speed: crate::ids::Meters,
    ) -> Self {
        Self {
            store,
            oracle,
            done,
            batch_time_ticks,
            tick_budget,
            vehicle_speed,
            event_log: None,
            strict_mode: false,
            skip_delayed: false,
            skip_assigned: false,
        }
    }

    /// Attach an event log shared with the simulation thread's [`Engine`](crate::engine::Engine),
    /// so `assign`'s `R`/`M` lines interleave correctly with the stepper's `P`/`D`/`A`/`T` lines.
    pub fn with_event_log(mut self, log: Arc<Mutex<EventLog>>) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Enable `Options::strict_mode` for every commit this harness accepts: reject
    /// commits that increase route cost beyond the bound
    /// `store::STRICT_MODE_COST_MULTIPLIER` enforces.
    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    /// Mirrors the original's `RSAlgorithm::listen(bool skip_delayed, ...)` first
    /// argument: when set, a vehicle already late against its own schedule is left out
    /// of `handle_vehicle` for the batch instead of being re-offered to the algorithm.
    pub fn with_skip_delayed(mut self, skip_delayed: bool) -> Self {
        self.skip_delayed = skip_delayed;
        self
    }

    /// Mirrors `RSAlgorithm::listen(.., bool skip_assigned)`: when set, a customer
    /// already assigned to a vehicle is left out of `handle_customer` for the batch.
    pub fn with_skip_assigned(mut self, skip_assigned: bool) -> Self {
        self.skip_assigned = skip_assigned;
        self
    }

    /// Run `algorithm` until `done` is observed, sleeping between batches so one batch
    /// spans `batch_time_ticks` ticks of simulation time. Intended to run on its own
    /// thread, alongside the simulation thread's own tick loop.
    pub fn run(&self, mut algorithm: Box<dyn RsAlgorithm>, now: impl Fn() -> Tick) {
        let batch_budget = self.tick_budget * self.batch_time_ticks.max(1) as u32;
        loop {
            if self.done.load(Ordering::SeqCst) {
                break;
            }
            let started = Instant::now();
            self.run_batch(&mut *algorithm, now());
            if self.done.load(Ordering::SeqCst) {
                break;
            }
            let elapsed = started.elapsed();
            if elapsed < batch_budget {
                thread::sleep(batch_budget - elapsed);
            } else {
                warn!(target: "harness", ?elapsed, ?batch_budget, "batch overran its budget");
            }
        }
        let ctx = HarnessContext {
            now: now(),
            store: &self.store,
            oracle: self.oracle.as_ref(),
            vehicle_speed: self.vehicle_speed,
            done: &self.done,
            event_log: self.event_log.as_ref(),
            strict_mode: self.strict_mode,
        };
        algorithm.end(&ctx);
        info!(target: "harness", "algorithm thread exiting");
    }

    fn run_batch(&self, algorithm: &mut dyn RsAlgorithm, now: Tick) {
        let ctx = HarnessContext {
            now,
            store: &self.store,
            oracle: self.oracle.as_ref(),
            vehicle_speed: self.vehicle_speed,
            done: &self.done,
            event_log: self.event_log.as_ref(),
            strict_mode: self.strict_mode,
        };

        for vehicle in self.store.select_matchable_vehicles(now, self.skip_delayed) {
            algorithm.handle_vehicle(&vehicle, &ctx);
        }
        for customer in self.store.select_waiting_customers(now, self.skip_assigned) {
            algorithm.handle_customer(&customer, &ctx);
        }
        algorithm.match_batch(&ctx);
    }
}

/// Logs an unexpected per-vehicle condition and quarantines it, mirroring the
/// original's "log and skip" failure mode for step-time inconsistencies.
pub fn quarantine_with_log(store: &FleetStore, vehicle: VehlId, detail: &str) {
    error!(target: "harness", %vehicle, detail, "store-consistency violation, quarantining vehicle");
    store.quarantine_vehicle(vehicle);
}
