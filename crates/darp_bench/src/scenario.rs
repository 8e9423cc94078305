//! Small, hand-rolled scenarios for benches, tests, and the `darp-bench` binary's
//! default run — tiny in-memory line/grid networks instead of loading production-scale
//! map data, since nothing here depends on real map tiles.

use std::sync::Arc;

use darp_core::ids::{CustId, Meters, NodeId, Tick, VehlId};
use darp_core::network::{GtreeOracle, RoadNetwork, ShortestPathOracle};
use darp_core::store::FleetStore;
use darp_core::trip::{Customer, Point, Route, Schedule, Stop, StopType, Trip, Vehicle, VehicleStatus, Wayp};

/// A network of `n` nodes in a straight line, `spacing_m` meters apart.
pub fn line_network(n: usize, spacing_m: Meters) -> GtreeOracle {
    let coords: Vec<Point> = (0..n)
        .map(|i| Point {
            lng: i as f64 * 0.001,
            lat: 0.0,
        })
        .collect();
    let edges: Vec<_> = (0..n.saturating_sub(1))
        .map(|i| (NodeId(i as u32), NodeId(i as u32 + 1), spacing_m))
        .collect();
    GtreeOracle::new(RoadNetwork::new(coords, &edges, false))
}

/// Build a bare vehicle with a direct origin-to-destination route and a two-stop
/// schedule (no customers assigned yet), the way a freshly-released vehicle looks
/// the instant it's inserted into the fleet store.
pub fn bare_vehicle(oracle: &GtreeOracle, id: u32, origin: u32, destination: u32, early: Tick, late: Tick, capacity: i32) -> Vehicle {
    let (path, cost) = (
        oracle.find_path(NodeId(origin), NodeId(destination)),
        oracle.distance(NodeId(origin), NodeId(destination)),
    );
    let mut data = Vec::with_capacity(path.len());
    let mut cumulative = 0;
    data.push(Wayp { dist: 0, node: NodeId(origin) });
    for pair in path.windows(2) {
        cumulative += oracle.distance(pair[0], pair[1]);
        data.push(Wayp { dist: cumulative, node: pair[1] });
    }
    debug_assert_eq!(cumulative, cost);

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

/// A taxi-mode vehicle: no fixed destination, a single-point self-route.
pub fn taxi_vehicle(id: u32, origin: u32, early: Tick, capacity: i32) -> Vehicle {
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

pub fn customer(id: u32, origin: u32, destination: u32, early: Tick, late: Tick, load: i32) -> Customer {
    Customer::new(CustId(id), NodeId(origin), NodeId(destination), early, late, load)
}

/// Populate a fresh [`FleetStore`] with `vehicles` and `customers`.
pub fn seed_store(vehicles: Vec<Vehicle>, customers: Vec<Customer>) -> Arc<FleetStore> {
    let store = Arc::new(FleetStore::new());
    for v in vehicles {
        store.insert_vehicle(v);
    }
    for c in customers {
        store.insert_customer(c);
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_vehicle_route_matches_oracle_distance() {
        let oracle = line_network(5, 100);
        let vehicle = bare_vehicle(&oracle, 1, 0, 4, 0, 1000, 2);
        assert_eq!(vehicle.route.cost(), 400);
        assert_eq!(vehicle.schedule.len(), 2);
    }

    #[test]
    fn taxi_vehicle_has_no_destination() {
        let vehicle = taxi_vehicle(1, 0, 0, 1);
        assert!(vehicle.is_taxi_mode());
        assert_eq!(vehicle.route.len(), 1);
    }
}
