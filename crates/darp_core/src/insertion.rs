//! Shared-ride insertion kernel (`sop_insert`/`sop_replace`).
//!
//! Given a vehicle's existing schedule and a new customer, finds the insertion
//! positions `(i, j)` that minimize total route cost, where the customer's origin
//! goes in at `i` and its destination at `j+1`. The vehicle's current pseudo-origin
//! (index 0) and final destination (last index) are fixed and never displaced.
//!
//! Grounded in `original_source/include/libcargo/functions.h`'s `sop_insert`
//! declaration and `example/greedy/greedy.cc`'s call site:
//! `sop_insert(*cand, cust, sch, rte, gtree) - cand->route().cost()`.

use crate::ids::{Meters, Tick, VehlId};
use crate::network::ShortestPathOracle;
use crate::trip::{Customer, Route, Schedule, Stop, StopType, Vehicle, Wayp};

/// Materialize a route through a sequence of stops: the shortest-path concatenation
/// between each consecutive pair, with cumulative distances. O(|stops| * path_len).
pub fn route_through(owner: VehlId, stops: &[Stop], oracle: &dyn ShortestPathOracle) -> (Route, Meters) {
    debug_assert!(!stops.is_empty());
    let mut data = Vec::with_capacity(stops.len());
    let mut cumulative: Meters = 0;
    data.push(Wayp {
        dist: 0,
        node: stops[0].loc,
    });
    for pair in stops.windows(2) {
        let (from, to) = (pair[0].loc, pair[1].loc);
        if from == to {
            continue;
        }
        let path = oracle.find_path(from, to);
        for edge in path.windows(2) {
            cumulative += oracle.distance(edge[0], edge[1]);
            data.push(Wayp {
                dist: cumulative,
                node: edge[1],
            });
        }
    }
    let cost = data.last().map(|w| w.dist).unwrap_or(0);
    (Route::new(owner, data), cost)
}

/// Core insertion search over an explicit stop list (fixed front/back). Returns the
/// minimum-cost schedule+route+cost for inserting `customer`'s origin/destination.
/// Ties broken lexicographically by `(i, j)` — earliest wins.
fn sop_insert_into(
    owner: VehlId,
    base: &[Stop],
    customer: &Customer,
    oracle: &dyn ShortestPathOracle,
) -> (Schedule, Route, Meters) {
    debug_assert!(base.len() >= 2, "schedule must retain fixed front/back stops");
    let n = base.len();
    let orig_early = customer.trip.early;
    let orig_late = customer.trip.late.unwrap_or(Tick::MAX);
    let dest_late = customer.trip.late.unwrap_or(Tick::MAX);
    let orig_stop = Stop::new(
        customer.id.into(),
        customer.trip.origin,
        StopType::CustOrig,
        orig_early,
        orig_late,
    );
    let dest_node = customer
        .trip
        .destination
        .expect("customer must have a destination");
    let dest_stop = Stop::new(
        customer.id.into(),
        dest_node,
        StopType::CustDest,
        orig_early,
        dest_late,
    );

    let mut best: Option<(usize, usize, Schedule, Route, Meters)> = None;

    for i in 1..n {
        for j in i..n {
            let mut candidate: Vec<Stop> = Vec::with_capacity(n + 2);
            candidate.extend_from_slice(&base[..i]);
            candidate.push(orig_stop);
            candidate.extend_from_slice(&base[i..j]);
            candidate.push(dest_stop);
            candidate.extend_from_slice(&base[j..]);

            let (route, cost) = route_through(owner, &candidate, oracle);
            let better = match &best {
                None => true,
                Some((_, _, _, _, best_cost)) => cost < *best_cost,
            };
            if better {
                let schedule = Schedule::new(owner, candidate);
                best = Some((i, j, schedule, route, cost));
            }
        }
    }

    let (_, _, schedule, route, cost) = best.expect("base has at least the fixed endpoints");
    (schedule, route, cost)
}

/// Find the minimum-detour insertion of `customer` into `vehicle`'s current schedule.
pub fn sop_insert(
    vehicle: &Vehicle,
    customer: &Customer,
    oracle: &dyn ShortestPathOracle,
) -> (Schedule, Route, Meters) {
    sop_insert_into(vehicle.id, &vehicle.schedule.data, customer, oracle)
}

/// Remove a customer's two stops from a schedule, returning the remaining stop list
/// (fixed front/back plus any other assigned customers, untouched).
pub fn remove_customer(schedule: &Schedule, cust: crate::ids::CustId) -> Vec<Stop> {
    let owner: crate::ids::TripId = cust.into();
    schedule
        .data
        .iter()
        .filter(|s| s.owner != owner)
        .copied()
        .collect()
}

/// Remove `remove` from the schedule, then insert `replacement` via [`sop_insert`].
/// Used by bilateral-style heuristics that swap one customer for another.
pub fn sop_replace(
    vehicle: &Vehicle,
    remove: crate::ids::CustId,
    replacement: &Customer,
    oracle: &dyn ShortestPathOracle,
) -> (Schedule, Route, Meters) {
    let base = remove_customer(&vehicle.schedule, remove);
    sop_insert_into(vehicle.id, &base, replacement, oracle)
}
