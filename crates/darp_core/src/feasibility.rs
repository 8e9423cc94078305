//! Feasibility kernel: time-window, capacity, and precedence checks.
//!
//! Grounded in `original_source/include/libcargo/functions.h`'s `chktw`/`chkpc`
//! declarations and the greedy example's call site (`chkcap(...) && chktw(...)`,
//! capacity checked first since it's the cheaper test). All three are pure and
//! cheaply composable: none mutate their inputs, all return a plain `bool`.

use crate::ids::{Load, Meters, Tick};
use crate::trip::{Route, Schedule, StopType};

/// Average speed in meters/tick, used to convert route distance into an ETA.
pub type Speed = Meters;

/// Time-window check: a merge-walk of the schedule against the route's cumulative
/// distances, O(|schedule| + |route|). `schedule` and `route` are different
/// sequences by construction — the route carries every waypoint along the shortest
/// path between consecutive stops, not just the stops themselves — so a stop's
/// distance is found by advancing a route pointer until it reaches that stop's node,
/// not by indexing both sequences in lockstep.
///
/// `reference_time` is the vehicle's current tick minus progress made since the last
/// node (i.e. the tick at which the vehicle was at `route.dist_at(0)`).
///
/// For an origin stop, arrival is clamped up to `early` (waiting is allowed). For a
/// destination stop (vehicle or customer), `arrival_time` must not exceed `late`.
pub fn chktw(schedule: &Schedule, route: &Route, reference_time: Tick, speed: Speed) -> bool {
    let speed = speed.max(1);
    let mut clamped_time = reference_time;
    let mut route_idx = 0usize;
    for i in 0..schedule.len() {
        let stop = schedule.at(i);
        while route_idx < route.len() && route.node_at(route_idx) != stop.loc {
            route_idx += 1;
        }
        if route_idx >= route.len() {
            return false; // route never reaches this stop's node
        }
        let travel_ticks = (route.dist_at(route_idx) / speed) as Tick;
        let mut arrival = reference_time.saturating_add(travel_ticks);
        // Waiting at an upstream stop delays every downstream arrival by the same
        // amount; track that via `clamped_time`, the latest of "true" arrival and
        // "we had to wait here" so far.
        arrival = arrival.max(clamped_time);
        if stop.is_origin() {
            clamped_time = arrival.max(stop.early);
        } else {
            if arrival > stop.late {
                return false;
            }
            clamped_time = arrival;
        }
    }
    true
}

/// Capacity check: running load starting from `current_load` (customers already
/// onboard), incremented at each `CustOrig`, decremented at each `CustDest`. Fails if
/// the load ever exceeds `capacity`.
pub fn chkcap(capacity: Load, schedule: &Schedule, current_load: Load) -> bool {
    let mut load = current_load;
    for i in 0..schedule.len() {
        match schedule.at(i).kind {
            StopType::CustOrig => {
                load += 1;
                if load > capacity {
                    return false;
                }
            }
            StopType::CustDest => load -= 1,
            StopType::VehlOrig | StopType::VehlDest => {}
        }
    }
    true
}

/// Precedence check: every customer's `CustOrig` must precede its `CustDest`.
pub fn chkpc(schedule: &Schedule) -> bool {
    use std::collections::HashMap;
    let mut seen_origin: HashMap<_, bool> = HashMap::new();
    for i in 0..schedule.len() {
        let stop = schedule.at(i);
        match stop.kind {
            StopType::CustOrig => {
                seen_origin.insert(stop.owner, true);
            }
            StopType::CustDest => {
                if !seen_origin.get(&stop.owner).copied().unwrap_or(false) {
                    return false;
                }
            }
            StopType::VehlOrig | StopType::VehlDest => {}
        }
    }
    true
}
