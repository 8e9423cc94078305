//! Nearest-neighbor streaming matcher: rank candidates by straight-line distance to
//! the pickup and take the first one that is feasible and within capacity, instead of
//! greedy's cheapest-detour search over every candidate.
//!
//! Grounded in `original_source/example/nearest_neighbor/nearest_neighbor.cpp`'s
//! `NearestNeighbor` class: candidates come from the same grid-and-radius search as
//! `greedy`, but are ordered by `haversine` distance from the vehicle's last visited
//! node to the customer's origin, and the loop stops at the first feasible hit rather
//! than scanning for the cheapest one.

use darp_core::feasibility::chktw;
use darp_core::grid::Grid;
use darp_core::harness::{HarnessContext, RsAlgorithm};
use darp_core::insertion::sop_insert;
use darp_core::network::haversine_m;
use darp_core::trip::{Customer, Vehicle};

const DEFAULT_PICKUP_RANGE_M: f64 = 2_000.0;

pub struct NearestNeighbor {
    grid: Grid,
    pickup_range_m: f64,
    matched: u32,
}

impl NearestNeighbor {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            pickup_range_m: DEFAULT_PICKUP_RANGE_M,
            matched: 0,
        }
    }

    pub fn with_pickup_range(mut self, meters: f64) -> Self {
        self.pickup_range_m = meters;
        self
    }

    pub fn matched(&self) -> u32 {
        self.matched
    }
}

impl RsAlgorithm for NearestNeighbor {
    fn handle_vehicle(&mut self, vehicle: &Vehicle, ctx: &HarnessContext<'_>) {
        let point = ctx.oracle.point_of(vehicle.last_visited_node());
        self.grid.insert(vehicle.id, point);
    }

    fn handle_customer(&mut self, customer: &Customer, ctx: &HarnessContext<'_>) {
        if customer.assigned_to.is_some() {
            return;
        }

        let pickup_point = ctx.oracle.point_of(customer.trip.origin);
        let mut candidates: Vec<(f64, darp_core::ids::VehlId)> = self
            .grid
            .within_about(self.pickup_range_m, pickup_point)
            .into_iter()
            .filter_map(|id| {
                let vehl = ctx.store.vehicle(id)?;
                if vehl.queued as i32 == vehl.capacity() {
                    return None;
                }
                let dist = haversine_m(ctx.oracle.point_of(vehl.last_visited_node()), pickup_point);
                Some((dist, id))
            })
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, id) in candidates {
            let Some(candidate) = ctx.store.vehicle(id) else { continue };
            let (schedule, route, _cost) = sop_insert(&candidate, customer, ctx.oracle);
            if chktw(&schedule, &route, ctx.now, ctx.vehicle_speed) {
                if ctx.assign(id, vec![customer.id], vec![], route, schedule) {
                    self.matched += 1;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{bare_vehicle, customer, line_network, seed_store};
    use darp_core::ids::{CustId, VehlId};
    use darp_core::trip::Point;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn matches_the_nearest_feasible_candidate() {
        let oracle = line_network(6, 100);
        let near = bare_vehicle(&oracle, 1, 1, 5, 0, 1000, 2);
        let far = bare_vehicle(&oracle, 2, 0, 5, 0, 1000, 2);
        let cust = customer(1, 2, 4, 0, 500, 1);
        let store = seed_store(vec![near, far], vec![cust]);

        let grid = Grid::new(8, (Point { lng: -1.0, lat: -1.0 }, Point { lng: 1.0, lat: 1.0 }));
        let mut algo = NearestNeighbor::new(grid);
        let done = Arc::new(AtomicBool::new(false));
        let ctx = HarnessContext::new(0, &store, &oracle, 10, &done);

        for id in [VehlId(1), VehlId(2)] {
            let v = store.vehicle(id).unwrap();
            algo.handle_vehicle(&v, &ctx);
        }
        let c = store.customer(CustId(1)).unwrap();
        algo.handle_customer(&c, &ctx);

        assert_eq!(store.customer(CustId(1)).unwrap().assigned_to, Some(VehlId(1)));
        assert_eq!(algo.matched(), 1);
    }

    #[test]
    fn skips_customers_already_assigned() {
        let oracle = line_network(4, 100);
        let vehicle = bare_vehicle(&oracle, 1, 0, 3, 0, 1000, 2);
        let mut cust = customer(1, 1, 2, 0, 500, 1);
        cust.assigned_to = Some(VehlId(1));
        let store = seed_store(vec![vehicle], vec![cust]);

        let grid = Grid::new(8, (Point { lng: -1.0, lat: -1.0 }, Point { lng: 1.0, lat: 1.0 }));
        let mut algo = NearestNeighbor::new(grid);
        let done = Arc::new(AtomicBool::new(false));
        let ctx = HarnessContext::new(0, &store, &oracle, 10, &done);

        let v = store.vehicle(VehlId(1)).unwrap();
        algo.handle_vehicle(&v, &ctx);
        let c = store.customer(CustId(1)).unwrap();
        algo.handle_customer(&c, &ctx);

        assert_eq!(algo.matched(), 0);
    }
}
