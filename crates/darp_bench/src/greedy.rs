//! Greedy streaming matcher: for each waiting customer, insert into whichever
//! candidate vehicle yields the cheapest feasible detour.
//!
//! Grounded directly in `original_source/example/greedy/greedy.cc`'s `Greedy` class:
//! a grid populated by `handle_vehicle`, searched by `handle_customer` for candidates
//! within `pickup_range`, evaluated by `sop_insert` cost delta and a `chkcap`/`chktw`
//! re-check, matched one customer at a time (not a batch optimizer — `match_batch` is
//! a no-op here, same as the original leaving `match()` undefined for a pure streaming
//! algorithm).

use darp_core::feasibility::{chkcap, chktw};
use darp_core::grid::Grid;
use darp_core::harness::{HarnessContext, RsAlgorithm};
use darp_core::ids::{Meters, VehlId};
use darp_core::insertion::sop_insert;
use darp_core::trip::{Customer, Vehicle};

/// Candidate search radius around a customer's pickup, in meters. The original's
/// `pickup_range(cust)` scales with the customer's own time-window slack; we use a
/// fixed radius here since this example algorithm isn't the thing under test.
const DEFAULT_PICKUP_RANGE_M: f64 = 2_000.0;

pub struct Greedy {
    grid: Grid,
    pickup_range_m: f64,
}

impl Greedy {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            pickup_range_m: DEFAULT_PICKUP_RANGE_M,
        }
    }

    pub fn with_pickup_range(mut self, meters: f64) -> Self {
        self.pickup_range_m = meters;
        self
    }
}

impl RsAlgorithm for Greedy {
    fn handle_vehicle(&mut self, vehicle: &Vehicle, ctx: &HarnessContext<'_>) {
        let point = ctx.oracle.point_of(vehicle.last_visited_node());
        self.grid.insert(vehicle.id, point);
    }

    fn handle_customer(&mut self, customer: &Customer, ctx: &HarnessContext<'_>) {
        let pickup_point = ctx.oracle.point_of(customer.trip.origin);
        let candidate_ids = self.grid.within_about(self.pickup_range_m, pickup_point);

        let mut best: Option<(VehlId, darp_core::trip::Schedule, darp_core::trip::Route, Meters)> = None;
        for id in candidate_ids {
            let Some(candidate) = ctx.store.vehicle(id) else { continue };
            if candidate.schedule.len() >= 10 {
                continue; // speed heuristic from the original: cap schedule growth
            }
            let (schedule, route, route_cost) = sop_insert(&candidate, customer, ctx.oracle);
            let detour = route_cost - candidate.route.cost();
            let better = best.as_ref().map(|(_, _, _, c)| detour < *c).unwrap_or(true);
            if !better {
                continue;
            }
            if chkcap(candidate.capacity(), &schedule, 0) && chktw(&schedule, &route, ctx.now, ctx.vehicle_speed) {
                best = Some((id, schedule, route, detour));
            }
        }

        if let Some((vehicle_id, schedule, route, _)) = best {
            ctx.assign(vehicle_id, vec![customer.id], vec![], route, schedule);
        }
    }
}
