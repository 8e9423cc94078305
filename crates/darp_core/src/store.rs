//! Fleet store: the single shared mutable resource.
//!
//! A `Mutex`-guarded `HashMap` pair keyed by `VehlId`/`CustId` — the "arena-and-index
//! storage" called for in place of the original's shared-pointer grid (see
//! `original_source/include/libcargo/grid.h`'s `shared_ptr<MutableVehicle>`). Every
//! query returns an owned snapshot; nothing escapes the lock as a reference. The same
//! mutex that serializes per-tick stepping also serializes commits, which is what gives
//! the synchronize protocol (`harness.rs`) its "a commit and a step never interleave"
//! guarantee for free.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::feasibility::{chkcap, chktw};
use crate::ids::{CustId, NodeId, Tick, VehlId};
use crate::trip::{Customer, CustomerStatus, Route, Schedule, Stop, StopType, Vehicle, VehicleStatus};

struct FleetState {
    vehicles: HashMap<VehlId, Vehicle>,
    customers: HashMap<CustId, Customer>,
}

pub struct FleetStore {
    state: Mutex<FleetState>,
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FleetState {
                vehicles: HashMap::new(),
                customers: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FleetState> {
        self.state.lock().expect("fleet store mutex poisoned")
    }

    pub fn insert_vehicle(&self, vehicle: Vehicle) {
        let mut state = self.lock();
        state.vehicles.insert(vehicle.id, vehicle);
    }

    pub fn insert_customer(&self, customer: Customer) {
        let mut state = self.lock();
        state.customers.insert(customer.id, customer);
    }

    /// Vehicles released (`early <= now`) and not yet `Arrived`. Quarantined vehicles
    /// are still returned (an algorithm may want to know about them) but excluded
    /// when `skip_delayed` is set along with any vehicle that has queued work.
    pub fn select_matchable_vehicles(&self, now: Tick, skip_delayed: bool) -> Vec<Vehicle> {
        let state = self.lock();
        state
            .vehicles
            .values()
            .filter(|v| v.trip.early <= now && v.status != VehicleStatus::Arrived)
            .filter(|v| !skip_delayed || v.queued == 0)
            .cloned()
            .collect()
    }

    /// Waiting customers released (`early <= now`), optionally excluding those already
    /// claimed by some vehicle (`skip_assigned`).
    pub fn select_waiting_customers(&self, now: Tick, skip_assigned: bool) -> Vec<Customer> {
        let state = self.lock();
        state
            .customers
            .values()
            .filter(|c| c.status == CustomerStatus::Waiting && c.trip.early <= now)
            .filter(|c| !skip_assigned || c.assigned_to.is_none())
            .cloned()
            .collect()
    }

    /// Vehicles crossing a node this tick: `next_node_distance <= 0`, not `Arrived`,
    /// not `Quarantined` (a quarantined vehicle is excluded from stepping until a
    /// successful commit clears the condition — see `VehicleStatus::Quarantined`), and
    /// with an actual next waypoint to cross into. An idle taxi-mode vehicle sitting at
    /// its single-waypoint self-route has nothing ahead of it on the route, so it must
    /// not be handed to the stepper even though its `next_node_distance` starts at 0.
    pub fn select_step_vehicles(&self, _now: Tick) -> Vec<Vehicle> {
        let state = self.lock();
        state
            .vehicles
            .values()
            .filter(|v| {
                v.next_node_distance <= 0
                    && v.status == VehicleStatus::Enroute
                    && v.idx_last_visited_node + 1 < v.route.len()
            })
            .cloned()
            .collect()
    }

    /// Advance every active vehicle's `next_node_distance` by one tick's travel. The
    /// stepper needs a "drive" pass ahead of `select_step_vehicles` to decide which
    /// vehicles just crossed a node this tick. A vehicle with no waypoint ahead of its
    /// current position (an idle taxi-mode vehicle's single-point self-route) has
    /// nothing to drive towards, so it is left untouched rather than drifting its
    /// `next_node_distance` further negative tick after tick.
    pub fn tick_drive(&self, speed: crate::ids::Meters) {
        let mut state = self.lock();
        for v in state.vehicles.values_mut() {
            if v.status == VehicleStatus::Enroute && v.idx_last_visited_node + 1 < v.route.len() {
                v.next_node_distance -= speed;
            }
        }
    }

    /// Cancel every `Waiting`, unassigned customer whose `early + period < now`. Returns
    /// the ids newly canceled by this call (for the event log's `T` line).
    pub fn timeout_customers(&self, now: Tick, period: Tick) -> Vec<CustId> {
        let mut state = self.lock();
        let mut canceled = Vec::new();
        for customer in state.customers.values_mut() {
            if customer.status == CustomerStatus::Waiting
                && customer.assigned_to.is_none()
                && customer.trip.early + period < now
            {
                customer.status = CustomerStatus::Canceled;
                canceled.push(customer.id);
            }
        }
        canceled
    }

    pub fn update_route(&self, vehicle: VehlId, route: Route) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.route = route;
        }
    }

    pub fn update_schedule(&self, vehicle: VehlId, schedule: Schedule) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.schedule = schedule;
        }
    }

    pub fn update_idx_last_visited_node(&self, vehicle: VehlId, idx: usize) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.idx_last_visited_node = idx;
        }
    }

    pub fn update_next_node_distance(&self, vehicle: VehlId, dist: crate::ids::Meters) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.next_node_distance = dist;
        }
    }

    pub fn pickup_customer(&self, vehicle: VehlId, cust: CustId) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.queued = v.queued.saturating_sub(1);
        }
        if let Some(c) = state.customers.get_mut(&cust) {
            c.status = CustomerStatus::Onboard;
        }
    }

    pub fn dropoff_customer(&self, cust: CustId) {
        let mut state = self.lock();
        if let Some(c) = state.customers.get_mut(&cust) {
            c.status = CustomerStatus::Arrived;
        }
    }

    pub fn deactivate_vehicle(&self, vehicle: VehlId) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.status = VehicleStatus::Arrived;
        }
    }

    pub fn quarantine_vehicle(&self, vehicle: VehlId) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            v.status = VehicleStatus::Quarantined;
        }
    }

    /// Mark the first unvisited stop in `vehicle`'s schedule matching `owner`/`loc`
    /// as visited at `now`.
    pub fn update_stop_visited_at(&self, vehicle: VehlId, owner: crate::ids::TripId, loc: NodeId, now: Tick) {
        let mut state = self.lock();
        if let Some(v) = state.vehicles.get_mut(&vehicle) {
            if let Some(stop) = v
                .schedule
                .data
                .iter_mut()
                .find(|s| s.owner == owner && s.loc == loc && s.visited_at.is_none())
            {
                stop.visited_at = Some(now);
            }
        }
    }

    pub fn vehicle(&self, id: VehlId) -> Option<Vehicle> {
        self.lock().vehicles.get(&id).cloned()
    }

    pub fn customer(&self, id: CustId) -> Option<Customer> {
        self.lock().customers.get(&id).cloned()
    }

    /// Vehicles the simulation is still waiting on: neither `Arrived` nor
    /// `Quarantined` (a quarantined vehicle will never step again, so it must not
    /// keep the clock's stop condition from being satisfied).
    pub fn active_vehicle_count(&self) -> usize {
        self.lock()
            .vehicles
            .values()
            .filter(|v| v.status == VehicleStatus::Enroute)
            .count()
    }

    pub fn all_vehicle_ids(&self) -> Vec<VehlId> {
        self.lock().vehicles.keys().copied().collect()
    }

    pub fn all_customer_ids(&self) -> Vec<CustId> {
        self.lock().customers.keys().copied().collect()
    }

    /// The commit path's single entry point: everything from "reload current state"
    /// through "write back" happens under one lock acquisition, so a `step` call and a
    /// `try_commit` call on the same vehicle can never interleave. Returns `true` iff
    /// the synchronize check passed and the new state was written.
    pub fn try_commit(&self, request: CommitRequest) -> bool {
        let mut state = self.lock();
        let vehicle = match state.vehicles.get(&request.vehicle) {
            Some(v) if v.status != VehicleStatus::Arrived => v.clone(),
            _ => return false,
        };

        let lvn_now = vehicle.idx_last_visited_node;
        let route_now = &vehicle.route;

        // Integrity check: the proposed route must agree with the authoritative one
        // up to and including the vehicle's current position.
        if request.new_route.len() <= lvn_now || route_now.len() <= lvn_now {
            return false;
        }
        for i in 0..=lvn_now {
            if request.new_route.node_at(i) != route_now.node_at(i)
                || request.new_route.dist_at(i) != route_now.dist_at(i)
            {
                return false;
            }
        }

        // No-backtrack check: a newly added customer's pickup must not land on an
        // already-visited index.
        for &cust in &request.cust_ids_to_add {
            if let Some(pos) = request
                .new_schedule
                .data
                .iter()
                .position(|s| s.kind == StopType::CustOrig && s.owner == cust.into())
            {
                if pos <= lvn_now {
                    return false;
                }
            }
        }

        // Strict mode: a commit may not grow the vehicle's route cost beyond
        // `STRICT_MODE_COST_MULTIPLIER` times its current cost, regardless of
        // feasibility.
        if request.strict_mode {
            let bound = (route_now.cost() as f64 * STRICT_MODE_COST_MULTIPLIER) as crate::ids::Meters;
            if request.new_route.cost() > bound {
                return false;
            }
        }

        // Capacity & time-window re-check against the now-current position.
        let current_load = current_onboard_load(&vehicle.schedule);
        if !chkcap(vehicle.capacity(), &request.new_schedule, current_load) {
            return false;
        }
        let reference_time = request.now.saturating_sub(
            (vehicle.next_node_distance.max(0) / request.speed.max(1)) as Tick,
        );
        if !chktw(&request.new_schedule, &request.new_route, reference_time, request.speed) {
            return false;
        }

        let vehicle_mut = state.vehicles.get_mut(&request.vehicle).expect("checked above");
        vehicle_mut.route = request.new_route;
        vehicle_mut.schedule = request.new_schedule;
        vehicle_mut.queued = vehicle_mut
            .queued
            .saturating_add(request.cust_ids_to_add.len() as u32)
            .saturating_sub(request.cust_ids_to_remove.len() as u32);

        for &cust in &request.cust_ids_to_add {
            if let Some(c) = state.customers.get_mut(&cust) {
                c.assigned_to = Some(request.vehicle);
            }
        }
        for &cust in &request.cust_ids_to_remove {
            if let Some(c) = state.customers.get_mut(&cust) {
                c.assigned_to = None;
            }
        }
        true
    }
}

/// Customers already picked up have their `CustOrig` stop removed from the schedule
/// the instant the stepper processes it (see `engine::step_vehicle`'s `remove(1)`), so
/// a lone `CustDest` with no matching `CustOrig` in the schedule means its owner is
/// already onboard. `chkcap` wants that count as its `current_load` baseline before
/// scanning the newly proposed schedule.
fn current_onboard_load(schedule: &Schedule) -> crate::ids::Load {
    use std::collections::HashSet;
    let mut has_origin = HashSet::new();
    for i in 0..schedule.len() {
        if schedule.at(i).kind == StopType::CustOrig {
            has_origin.insert(schedule.at(i).owner);
        }
    }
    let mut onboard = 0;
    for i in 0..schedule.len() {
        let stop = schedule.at(i);
        if stop.kind == StopType::CustDest && !has_origin.contains(&stop.owner) {
            onboard += 1;
        }
    }
    onboard
}

/// Everything the synchronize check needs: the proposed route/schedule and which
/// customers are being newly added/removed by this commit.
pub struct CommitRequest {
    pub vehicle: VehlId,
    pub new_route: Route,
    pub new_schedule: Schedule,
    pub cust_ids_to_add: Vec<CustId>,
    pub cust_ids_to_remove: Vec<CustId>,
    pub now: Tick,
    pub speed: crate::ids::Meters,
    /// `Options::strict_mode`: when set, the commit is rejected if it grows the
    /// vehicle's route cost beyond `STRICT_MODE_COST_MULTIPLIER` times its current cost.
    pub strict_mode: bool,
}

/// Strict mode's cost-growth bound, expressed as a multiplier of the vehicle's
/// route cost before the commit.
pub const STRICT_MODE_COST_MULTIPLIER: f64 = 1.5;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{NodeId, TripId};
    use crate::trip::{Trip, Wayp};

    fn vehicle(id: u32) -> Vehicle {
        Vehicle {
            trip: Trip {
                id: TripId(id),
                origin: NodeId(0),
                destination: Some(NodeId(4)),
                early: 0,
                late: Some(1000),
                load: -2,
            },
            id: VehlId(id),
            route: Route::new(
                VehlId(id),
                vec![
                    Wayp { dist: 0, node: NodeId(0) },
                    Wayp { dist: 400, node: NodeId(4) },
                ],
            ),
            schedule: Schedule::new(
                VehlId(id),
                vec![
                    Stop::new(TripId(id), NodeId(0), StopType::VehlOrig, 0, 1000),
                    Stop::new(TripId(id), NodeId(4), StopType::VehlDest, 0, 1000),
                ],
            ),
            idx_last_visited_node: 0,
            next_node_distance: 100,
            queued: 0,
            status: VehicleStatus::Enroute,
        }
    }

    #[test]
    fn timeout_cancels_unassigned_waiting_customers() {
        let store = FleetStore::new();
        store.insert_customer(Customer::new(CustId(1), NodeId(0), NodeId(1), 0, 100, 1));
        let canceled = store.timeout_customers(100, 30);
        assert_eq!(canceled, vec![CustId(1)]);
        assert_eq!(store.customer(CustId(1)).unwrap().status, CustomerStatus::Canceled);
    }

    #[test]
    fn timeout_spares_assigned_customers() {
        let store = FleetStore::new();
        let mut cust = Customer::new(CustId(1), NodeId(0), NodeId(1), 0, 100, 1);
        cust.assigned_to = Some(VehlId(1));
        store.insert_customer(cust);
        let canceled = store.timeout_customers(100, 30);
        assert!(canceled.is_empty());
    }

    #[test]
    fn commit_rejected_when_vehicle_has_advanced_past_proposed_prefix() {
        let store = FleetStore::new();
        let mut v = vehicle(1);
        v.idx_last_visited_node = 1; // vehicle already at N4 in the authoritative route
        store.insert_vehicle(v);

        // Proposal computed against a stale route that still has the vehicle at N0.
        let stale_route = Route::new(
            VehlId(1),
            vec![
                Wayp { dist: 0, node: NodeId(0) },
                Wayp { dist: 200, node: NodeId(2) },
                Wayp { dist: 400, node: NodeId(4) },
            ],
        );
        let stale_schedule = Schedule::new(
            VehlId(1),
            vec![
                Stop::new(TripId(1), NodeId(0), StopType::VehlOrig, 0, 1000),
                Stop::new(TripId(9), NodeId(2), StopType::CustOrig, 0, 1000),
                Stop::new(TripId(1), NodeId(4), StopType::VehlDest, 0, 1000),
            ],
        );
        let request = CommitRequest {
            vehicle: VehlId(1),
            new_route: stale_route,
            new_schedule: stale_schedule,
            cust_ids_to_add: vec![CustId(9)],
            cust_ids_to_remove: vec![],
            now: 10,
            speed: 10,
            strict_mode: false,
        };
        assert!(!store.try_commit(request));
        // Store is untouched.
        assert_eq!(store.vehicle(VehlId(1)).unwrap().route.len(), 2);
    }

    #[test]
    fn commit_accepted_when_prefix_matches() {
        let store = FleetStore::new();
        store.insert_vehicle(vehicle(1));

        let new_route = Route::new(
            VehlId(1),
            vec![
                Wayp { dist: 0, node: NodeId(0) },
                Wayp { dist: 200, node: NodeId(2) },
                Wayp { dist: 400, node: NodeId(4) },
            ],
        );
        let new_schedule = Schedule::new(
            VehlId(1),
            vec![
                Stop::new(TripId(1), NodeId(0), StopType::VehlOrig, 0, 1000),
                Stop::new(TripId(9), NodeId(2), StopType::CustOrig, 0, 1000),
                Stop::new(TripId(1), NodeId(4), StopType::VehlDest, 0, 1000),
            ],
        );
        let request = CommitRequest {
            vehicle: VehlId(1),
            new_route,
            new_schedule,
            cust_ids_to_add: vec![CustId(9)],
            cust_ids_to_remove: vec![],
            now: 0,
            speed: 10,
            strict_mode: false,
        };
        assert!(store.try_commit(request));
        assert_eq!(store.vehicle(VehlId(1)).unwrap().route.len(), 3);
    }
}
