//! The explicit `Engine` value: clock, options, oracle, store, and the stepper that
//! advances vehicles tick by tick.
//!
//! An explicit value rather than global statics or ECS-world resources: an explicit
//! simulation context, not ambient global state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use tracing::{info, warn};

use crate::clock::{tick_budget, SimulationClock};
use crate::harness::quarantine_with_log;
use crate::ids::{CustId, Meters, Tick, TripId, VehlId};
use crate::network::ShortestPathOracle;
use crate::options::Options;
use crate::store::FleetStore;
use crate::telemetry::{Event, EventLog};
use crate::trip::{Stop, StopType, Vehicle, VehicleStatus};

pub struct Engine {
    pub clock: SimulationClock,
    pub options: Options,
    pub oracle: Arc<dyn ShortestPathOracle>,
    pub store: Arc<FleetStore>,
    pub done: Arc<AtomicBool>,
    pub event_log: Option<Arc<Mutex<EventLog>>>,
    shared_now: Arc<AtomicU64>,
}

impl Engine {
    pub fn new(
        options: Options,
        oracle: Arc<dyn ShortestPathOracle>,
        store: Arc<FleetStore>,
        done: Arc<AtomicBool>,
        tmin: Tick,
        tmax: Tick,
    ) -> Self {
        Self {
            clock: SimulationClock::new(tmin, tmax),
            options,
            oracle,
            store,
            done,
            event_log: None,
            shared_now: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach an event log; every tick's pickups/dropoffs/arrivals/timeouts and the
    /// GPS-throttled `V` position line (`Options::gps_timing`) are appended to it.
    pub fn with_event_log(mut self, log: Arc<Mutex<EventLog>>) -> Self {
        self.event_log = Some(log);
        self
    }

    /// A cloneable read handle on `now`, for the algorithm thread's batch loop: both
    /// threads need a shared notion of simulation time, since the harness's
    /// `now: impl Fn() -> Tick` can't reach into the engine's own `SimulationClock`
    /// directly once it's moved onto its own thread.
    pub fn shared_now(&self) -> Arc<AtomicU64> {
        self.shared_now.clone()
    }

    /// Run the simulation thread to completion: tick, step, sleep, repeat, until the
    /// stop condition holds. Sets `done` on exit so the algorithm thread can observe
    /// cancellation at its next batch boundary.
    pub fn run(&mut self) {
        let budget = tick_budget(self.options.time_multiplier);
        loop {
            let tick_started = Instant::now();
            let now = self.clock.now();
            self.shared_now.store(now, Ordering::Relaxed);

            let timed_out = self.store.timeout_customers(now, self.options.matching_period);
            if !timed_out.is_empty() {
                self.log(now, Event::Timeouts(timed_out));
            }
            self.step(now);
            self.log_positions(now);

            let active = self.store.active_vehicle_count();
            self.clock.tick();
            if self.clock.can_stop(active) {
                break;
            }

            let elapsed = tick_started.elapsed();
            if elapsed < budget {
                thread::sleep(budget - elapsed);
            } else {
                warn!(target: "engine", ?elapsed, ?budget, "tick overran its budget");
            }
        }
        self.done.store(true, Ordering::SeqCst);
        info!(target: "engine", tick = self.clock.now(), "simulation terminated");
        if let Some(log) = &self.event_log {
            let _ = log.lock().expect("event log mutex poisoned").flush();
        }
    }

    /// One tick's worth of stepping: drive every active vehicle forward by `speed`,
    /// then resolve node crossings for whichever ones just reached `nnd <= 0`.
    fn step(&self, now: Tick) {
        self.store.tick_drive(self.options.vehicle_speed);
        let mut pickups = Vec::new();
        let mut dropoffs = Vec::new();
        let mut arrivals = Vec::new();
        for vehicle in self.store.select_step_vehicles(now) {
            for event in step_vehicle(&self.store, self.oracle.as_ref(), &vehicle, now) {
                match event {
                    StepEvent::Pickup(c) => pickups.push(c),
                    StepEvent::Dropoff(c) => dropoffs.push(c),
                    StepEvent::Arrival(v) => arrivals.push(v),
                }
            }
        }
        if !pickups.is_empty() {
            self.log(now, Event::Pickups(pickups));
        }
        if !dropoffs.is_empty() {
            self.log(now, Event::Dropoffs(dropoffs));
        }
        if !arrivals.is_empty() {
            self.log(now, Event::Arrivals(arrivals));
        }
    }

    /// Emit a `V` position line for every active vehicle, throttled to once every
    /// `gps_timing` ticks.
    fn log_positions(&self, now: Tick) {
        if self.event_log.is_none() || now % self.options.gps_timing.max(1) != 0 {
            return;
        }
        let positions: Vec<(VehlId, crate::ids::NodeId)> = self
            .store
            .all_vehicle_ids()
            .into_iter()
            .filter_map(|id| self.store.vehicle(id))
            .filter(|v| v.status != VehicleStatus::Arrived)
            .map(|v| (v.id, v.last_visited_node()))
            .collect();
        if !positions.is_empty() {
            self.log(now, Event::Positions { positions });
        }
    }

    fn log(&self, now: Tick, event: Event) {
        if let Some(log) = &self.event_log {
            let _ = log.lock().expect("event log mutex poisoned").record(now, &event);
        }
    }
}

/// What happened to a customer/vehicle while [`step_vehicle`] walked past a stop.
enum StepEvent {
    Pickup(CustId),
    Dropoff(CustId),
    Arrival(VehlId),
}

/// Advance a single vehicle past as many nodes as its remaining `next_node_distance`
/// allows this tick, firing pickup/dropoff/arrival events along the way. The leading
/// `nnd -= speed` step is performed once per tick by `FleetStore::tick_drive`, ahead
/// of this call.
fn step_vehicle(store: &FleetStore, _oracle: &dyn ShortestPathOracle, vehicle: &Vehicle, now: Tick) -> Vec<StepEvent> {
    let mut nnd = vehicle.next_node_distance;
    let mut lvn = vehicle.idx_last_visited_node;
    let mut schedule = vehicle.schedule.clone();
    let route = &vehicle.route;
    let mut arrived = false;
    let mut events = Vec::new();

    while nnd <= 0 && !arrived && lvn + 1 < route.len() {
        lvn += 1;
        if lvn >= route.len() {
            quarantine_with_log(store, vehicle.id, "stepper ran past the end of the route");
            return events;
        }
        // Most nodes crossed are plain waypoints with no schedule entry; only handle
        // a stop when the route's current node actually matches the next one due.
        if schedule.len() >= 2 && route.node_at(lvn) == schedule.at(1).loc {
            let stop = *schedule.at(1);
            match stop.kind {
                StopType::VehlDest => {
                    store.deactivate_vehicle(vehicle.id);
                    arrived = true;
                    events.push(StepEvent::Arrival(vehicle.id));
                }
                StopType::CustOrig => {
                    let cust = owner_as_cust(stop.owner);
                    store.pickup_customer(vehicle.id, cust);
                    events.push(StepEvent::Pickup(cust));
                }
                StopType::CustDest => {
                    let cust = owner_as_cust(stop.owner);
                    store.dropoff_customer(cust);
                    events.push(StepEvent::Dropoff(cust));
                }
                StopType::VehlOrig => {}
            }
            store.update_stop_visited_at(vehicle.id, stop.owner, stop.loc, now);
            schedule.data.remove(1);
        } else if lvn == route.len() - 1 {
            // The route's final node should always be the schedule's final stop; a
            // mismatch here means the two drifted out of sync under the algorithm.
            quarantine_with_log(store, vehicle.id, "reached route end without matching final stop");
            return events;
        }

        if !arrived {
            if lvn + 1 >= route.len() {
                break;
            }
            nnd += route.dist_at(lvn + 1) - route.dist_at(lvn);
        }
    }

    if lvn != vehicle.idx_last_visited_node && !schedule.is_empty() {
        let prior = schedule.data[0];
        schedule.data[0] = Stop::new(prior.owner, route.node_at(lvn), StopType::VehlOrig, prior.early, prior.late);
    }

    store.update_schedule(vehicle.id, schedule);
    store.update_idx_last_visited_node(vehicle.id, lvn);
    store.update_next_node_distance(vehicle.id, nnd);
    events
}

fn owner_as_cust(owner: TripId) -> CustId {
    CustId(owner.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::network::{GtreeOracle, RoadNetwork};
    use crate::trip::{Point, Route, Schedule, Trip, Wayp};

    fn line_network(n: usize, spacing_m: Meters) -> GtreeOracle {
        let coords: Vec<Point> = (0..n)
            .map(|i| Point {
                lng: i as f64 * 0.001,
                lat: 0.0,
            })
            .collect();
        let edges: Vec<_> = (0..n - 1)
            .map(|i| (NodeId(i as u32), NodeId(i as u32 + 1), spacing_m))
            .collect();
        GtreeOracle::new(RoadNetwork::new(coords, &edges, false))
    }

    fn straight_line_vehicle() -> Vehicle {
        let route = Route::new(
            VehlId(1),
            vec![
                Wayp { dist: 0, node: NodeId(0) },
                Wayp { dist: 100, node: NodeId(1) },
                Wayp { dist: 200, node: NodeId(2) },
                Wayp { dist: 300, node: NodeId(3) },
                Wayp { dist: 400, node: NodeId(4) },
            ],
        );
        let schedule = Schedule::new(
            VehlId(1),
            vec![
                Stop::new(TripId(1), NodeId(0), StopType::VehlOrig, 0, 1000),
                Stop::new(TripId(1), NodeId(4), StopType::VehlDest, 0, 1000),
            ],
        );
        Vehicle {
            trip: Trip {
                id: TripId(1),
                origin: NodeId(0),
                destination: Some(NodeId(4)),
                early: 0,
                late: Some(1000),
                load: -2,
            },
            id: VehlId(1),
            route,
            schedule,
            idx_last_visited_node: 0,
            next_node_distance: 100,
            queued: 0,
            status: VehicleStatus::Enroute,
        }
    }

    #[test]
    fn scenario_a_single_straight_line_route() {
        let oracle = line_network(5, 100);
        let store = FleetStore::new();
        store.insert_vehicle(straight_line_vehicle());

        // tick 1: nnd 100 - 10 = 90, stays at N0 (not yet crossing)
        store.tick_drive(10);
        for v in store.select_step_vehicles(0) {
            step_vehicle(&store, &oracle, &v, 0);
        }
        let v = store.vehicle(VehlId(1)).unwrap();
        assert_eq!(v.next_node_distance, 90);
        assert_eq!(v.idx_last_visited_node, 0);

        // run ticks up to 10: nnd should hit 0 and cross to N1
        let mut nnd = 90;
        let mut tick = 1;
        while nnd > 0 {
            store.tick_drive(10);
            for v in store.select_step_vehicles(tick) {
                step_vehicle(&store, &oracle, &v, tick);
            }
            nnd = store.vehicle(VehlId(1)).unwrap().next_node_distance;
            tick += 1;
        }
        assert_eq!(tick, 10);
        let v = store.vehicle(VehlId(1)).unwrap();
        assert_eq!(v.idx_last_visited_node, 1);
        assert_eq!(v.next_node_distance, 90);

        // keep going until arrival
        for t in tick..40 {
            store.tick_drive(10);
            for v in store.select_step_vehicles(t) {
                step_vehicle(&store, &oracle, &v, t);
            }
        }
        let v = store.vehicle(VehlId(1)).unwrap();
        assert_eq!(v.status, VehicleStatus::Arrived);
    }

    #[test]
    fn idle_taxi_vehicle_never_quarantines_while_waiting_for_work() {
        let oracle = line_network(5, 100);
        let store = FleetStore::new();
        let route = Route::new(VehlId(1), vec![Wayp { dist: 0, node: NodeId(2) }]);
        let schedule = Schedule::new(
            VehlId(1),
            vec![
                Stop::new(TripId(1), NodeId(2), StopType::VehlOrig, 0, Tick::MAX),
                Stop::new(TripId(1), NodeId(2), StopType::VehlDest, 0, Tick::MAX),
            ],
        );
        store.insert_vehicle(Vehicle {
            trip: Trip {
                id: TripId(1),
                origin: NodeId(2),
                destination: None,
                early: 0,
                late: None,
                load: -2,
            },
            id: VehlId(1),
            route,
            schedule,
            idx_last_visited_node: 0,
            next_node_distance: 0,
            queued: 0,
            status: VehicleStatus::Enroute,
        });

        for t in 0..20 {
            store.tick_drive(10);
            for v in store.select_step_vehicles(t) {
                step_vehicle(&store, &oracle, &v, t);
            }
        }

        let v = store.vehicle(VehlId(1)).unwrap();
        assert_eq!(v.status, VehicleStatus::Enroute);
        assert_eq!(v.next_node_distance, 0);
        assert_eq!(v.idx_last_visited_node, 0);
    }

    #[test]
    fn reaching_route_end_without_matching_final_stop_quarantines_vehicle() {
        let oracle = line_network(5, 100);
        let store = FleetStore::new();
        let mut vehicle = straight_line_vehicle();
        // Force a mismatch at the route's final node: VehlDest now points elsewhere.
        vehicle.schedule.data[1].loc = NodeId(999);
        // Drive the vehicle all the way to the end of the route in one tick.
        vehicle.next_node_distance = -10_000;
        store.insert_vehicle(vehicle);

        step_vehicle(&store, &oracle, &store.vehicle(VehlId(1)).unwrap(), 5);

        assert_eq!(store.vehicle(VehlId(1)).unwrap().status, VehicleStatus::Quarantined);
    }
}
