//! End-to-end scenarios over the engine, store, and harness together: a straight-line
//! run to completion, a single streaming match, capacity enforcement, a rejected
//! racing commit, customer timeout, and taxi-mode vehicles (no fixed destination).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use darp_core::engine::Engine;
use darp_core::feasibility::{chkcap, chktw};
use darp_core::harness::HarnessContext;
use darp_core::ids::{CustId, NodeId, Tick, VehlId};
use darp_core::insertion::sop_insert;
use darp_core::network::{GtreeOracle, RoadNetwork, ShortestPathOracle};
use darp_core::options::Options;
use darp_core::store::{CommitRequest, FleetStore};
use darp_core::telemetry::EventLog;
use darp_core::trip::{Customer, CustomerStatus, Point, Route, Schedule, Stop, StopType, Trip, Vehicle, VehicleStatus, Wayp};

fn line_network(n: usize, spacing_m: i64) -> GtreeOracle {
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

fn bare_vehicle(oracle: &GtreeOracle, id: u32, origin: u32, destination: u32, early: Tick, late: Tick, capacity: i32) -> Vehicle {
    let path = oracle.find_path(NodeId(origin), NodeId(destination));
    let mut data = Vec::with_capacity(path.len());
    let mut cumulative = 0;
    data.push(Wayp { dist: 0, node: NodeId(origin) });
    for pair in path.windows(2) {
        cumulative += oracle.distance(pair[0], pair[1]);
        data.push(Wayp { dist: cumulative, node: pair[1] });
    }
    Vehicle {
        trip: Trip {
            id: VehlId(id).into(),
            origin: NodeId(origin),
            destination: Some(NodeId(destination)),
            early,
            late: Some(late),
            load: -capacity,
        },
        id: VehlId(id),
        route: Route::new(VehlId(id), data),
        schedule: Schedule::new(
            VehlId(id),
            vec![
                Stop::new(VehlId(id).into(), NodeId(origin), StopType::VehlOrig, early, late),
                Stop::new(VehlId(id).into(), NodeId(destination), StopType::VehlDest, early, late),
            ],
        ),
        idx_last_visited_node: 0,
        next_node_distance: 0,
        queued: 0,
        status: VehicleStatus::Enroute,
    }
}

fn taxi_vehicle(id: u32, origin: u32, early: Tick, capacity: i32) -> Vehicle {
    Vehicle {
        trip: Trip {
            id: VehlId(id).into(),
            origin: NodeId(origin),
            destination: None,
            early,
            late: None,
            load: -capacity,
        },
        id: VehlId(id),
        route: Route::new(VehlId(id), vec![Wayp { dist: 0, node: NodeId(origin) }]),
        schedule: Schedule::new(
            VehlId(id),
            vec![
                Stop::new(VehlId(id).into(), NodeId(origin), StopType::VehlOrig, early, Tick::MAX),
                Stop::new(VehlId(id).into(), NodeId(origin), StopType::VehlDest, early, Tick::MAX),
            ],
        ),
        idx_last_visited_node: 0,
        next_node_distance: 0,
        queued: 0,
        status: VehicleStatus::Enroute,
    }
}

fn fast_options() -> Options {
    Options {
        path_to_roadnet: "unused.rnet".into(),
        path_to_edges: "unused.edges".into(),
        path_to_gtree: None,
        path_to_problem: "unused.instance".into(),
        path_to_solution: None,
        path_to_dataout: None,
        time_multiplier: 5_000,
        vehicle_speed: 10,
        matching_period: 30,
        strict_mode: false,
        static_mode: false,
        gps_timing: 1,
    }
}

/// Scenario A: a single vehicle with no customers drives its fixed route to
/// completion and the simulation terminates on its own.
#[test]
fn scenario_a_straight_line_route_runs_to_completion() {
    let oracle = Arc::new(line_network(5, 100));
    let vehicle = bare_vehicle(&oracle, 1, 0, 4, 0, 1000, 2);
    let store = Arc::new(FleetStore::new());
    store.insert_vehicle(vehicle);

    let done = Arc::new(AtomicBool::new(false));
    let oracle_dyn: Arc<dyn ShortestPathOracle> = oracle;
    let mut engine = Engine::new(fast_options(), oracle_dyn, store.clone(), done, 0, Tick::MAX);
    engine.run();

    let finished = store.vehicle(VehlId(1)).unwrap();
    assert_eq!(finished.status, VehicleStatus::Arrived);
    assert_eq!(store.active_vehicle_count(), 0);
}

/// Scenario B: a waiting customer is matched to the only candidate vehicle via
/// `sop_insert`, then the combined route runs to completion and the customer is
/// dropped off.
#[test]
fn scenario_b_matched_customer_is_picked_up_and_dropped_off() {
    let oracle = Arc::new(line_network(6, 100));
    let vehicle = bare_vehicle(&oracle, 1, 0, 5, 0, 10_000, 2);
    let cust = Customer::new(CustId(1), NodeId(1), NodeId(4), 0, 5_000, 1);
    let store = Arc::new(FleetStore::new());
    store.insert_vehicle(vehicle.clone());
    store.insert_customer(cust.clone());

    let (schedule, route, _cost) = sop_insert(&vehicle, &cust, oracle.as_ref());
    assert!(chkcap(vehicle.capacity(), &schedule, 0));
    assert!(chktw(&schedule, &route, 0, 10));

    let accepted = store.try_commit(CommitRequest {
        vehicle: VehlId(1),
        new_route: route,
        new_schedule: schedule,
        cust_ids_to_add: vec![CustId(1)],
        cust_ids_to_remove: vec![],
        now: 0,
        speed: 10,
        strict_mode: false,
    });
    assert!(accepted);

    let done = Arc::new(AtomicBool::new(false));
    let oracle_dyn: Arc<dyn ShortestPathOracle> = oracle;
    let mut engine = Engine::new(fast_options(), oracle_dyn, store.clone(), done, 0, Tick::MAX);
    engine.run();

    let finished_cust = store.customer(CustId(1)).unwrap();
    assert_eq!(finished_cust.status, CustomerStatus::Arrived);
    let finished_vehl = store.vehicle(VehlId(1)).unwrap();
    assert_eq!(finished_vehl.status, VehicleStatus::Arrived);
}

/// Scenario C: capacity enforcement. A two-seat vehicle already carrying one
/// passenger cannot accept a second customer whose pickup/dropoff would put it over
/// capacity while both are onboard.
#[test]
fn scenario_c_capacity_is_enforced_against_already_onboard_customers() {
    let oracle = line_network(6, 100);
    let mut vehicle = bare_vehicle(&oracle, 1, 0, 5, 0, 10_000, 1);
    // Simulate customer 9 already picked up (its CustOrig stop already removed, as
    // the stepper does on pickup): only a lone CustDest remains in the schedule.
    vehicle.schedule = Schedule::new(
        VehlId(1),
        vec![
            Stop::new(VehlId(1).into(), NodeId(0), StopType::VehlOrig, 0, 10_000),
            Stop::new(CustId(9).into(), NodeId(3), StopType::CustDest, 0, 10_000),
            Stop::new(VehlId(1).into(), NodeId(5), StopType::VehlDest, 0, 10_000),
        ],
    );

    let second = Customer::new(CustId(2), NodeId(1), NodeId(4), 0, 5_000, 1);
    let (schedule, _route, _cost) = sop_insert(&vehicle, &second, &oracle);
    // Capacity is 1; customer 9 is already onboard, so adding customer 2 while both
    // are in the vehicle must be rejected.
    assert!(!chkcap(vehicle.capacity(), &schedule, 1));
}

/// Property 6: a commit racing against a stepper update that has already advanced
/// the vehicle past a node the proposed route assumed was still ahead is rejected by
/// the synchronize check, not silently applied.
#[test]
fn property_6_commit_against_stale_position_is_rejected() {
    let oracle = line_network(6, 100);
    let vehicle = bare_vehicle(&oracle, 1, 0, 5, 0, 10_000, 2);
    let store = Arc::new(FleetStore::new());
    store.insert_vehicle(vehicle.clone());

    // Advance the vehicle's position out from under the proposal: the stepper has
    // moved lvn to 2, but `new_route`/`new_schedule` below are built assuming the
    // vehicle is still at index 0 in a route that's since changed length.
    store.update_idx_last_visited_node(VehlId(1), 2);

    let shorter_route = Route::new(VehlId(1), vec![Wayp { dist: 0, node: NodeId(0) }, Wayp { dist: 100, node: NodeId(1) }]);
    let shorter_schedule = Schedule::new(
        VehlId(1),
        vec![
            Stop::new(VehlId(1).into(), NodeId(0), StopType::VehlOrig, 0, 10_000),
            Stop::new(VehlId(1).into(), NodeId(1), StopType::VehlDest, 0, 10_000),
        ],
    );

    let accepted = store.try_commit(CommitRequest {
        vehicle: VehlId(1),
        new_route: shorter_route,
        new_schedule: shorter_schedule,
        cust_ids_to_add: vec![],
        cust_ids_to_remove: vec![],
        now: 0,
        speed: 10,
        strict_mode: false,
    });
    assert!(!accepted, "a route shorter than the vehicle's already-traveled index must be rejected");
}

/// Scenario E: an unmatched customer past its matching period is canceled, not left
/// waiting forever.
#[test]
fn scenario_e_unmatched_customer_times_out() {
    let store = FleetStore::new();
    let cust = Customer::new(CustId(1), NodeId(0), NodeId(1), 0, 1_000, 1);
    store.insert_customer(cust);

    let still_waiting = store.timeout_customers(10, 30);
    assert!(still_waiting.is_empty());

    let timed_out = store.timeout_customers(40, 30);
    assert_eq!(timed_out, vec![CustId(1)]);
    assert_eq!(store.customer(CustId(1)).unwrap().status, CustomerStatus::Canceled);
}

/// Scenario F: a taxi-mode vehicle (no fixed destination) can still be matched via
/// the same `sop_insert` kernel, extending its one-waypoint self-route.
#[test]
fn scenario_f_taxi_mode_vehicle_accepts_a_match() {
    let oracle = line_network(6, 100);
    let vehicle = taxi_vehicle(1, 2, 0, 2);
    assert!(vehicle.is_taxi_mode());

    let cust = Customer::new(CustId(1), NodeId(2), NodeId(5), 0, 5_000, 1);
    let (schedule, route, _cost) = sop_insert(&vehicle, &cust, &oracle);
    assert!(chkcap(vehicle.capacity(), &schedule, 0));
    assert!(chktw(&schedule, &route, 0, 10));
    assert!(schedule.len() > vehicle.schedule.len());
}

/// Harness round-trip: the streaming `assign` path logs both a route-commit and a
/// match-commit event when an event log is attached.
#[test]
fn harness_assign_logs_route_and_match_events() {
    let oracle = line_network(5, 100);
    let vehicle = bare_vehicle(&oracle, 1, 0, 4, 0, 1000, 2);
    let cust = Customer::new(CustId(1), NodeId(1), NodeId(3), 0, 500, 1);
    let store = Arc::new(FleetStore::new());
    store.insert_vehicle(vehicle.clone());
    store.insert_customer(cust.clone());

    let (schedule, route, _) = sop_insert(&vehicle, &cust, &oracle);

    let buf = Arc::new(std::sync::Mutex::new(Vec::new()));
    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);
    impl std::io::Write for SharedBuf {
        fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(b)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    let log = Arc::new(std::sync::Mutex::new(EventLog::new(SharedBuf(buf.clone()))));
    let done = Arc::new(AtomicBool::new(false));
    let ctx = HarnessContext::new(0, &store, &oracle, 10, &done).with_event_log(&log);

    let accepted = ctx.assign(VehlId(1), vec![CustId(1)], vec![], route, schedule);
    assert!(accepted);
    log.lock().unwrap().flush().unwrap();
    let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    assert!(text.contains("R 1"));
    assert!(text.contains("M 1 1"));
}
