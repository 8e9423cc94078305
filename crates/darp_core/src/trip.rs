//! Core data model: points, waypoints, stops, routes, schedules, trips.
//!
//! Mirrors `original_source/include/libcargo/classes.h` (`Stop`, `Schedule`, `Route`,
//! `Trip`, `Customer`, `Vehicle`) but as plain Rust structs instead of getter-only C++
//! classes — there is no encapsulation boundary to preserve inside a single crate.

use serde::{Deserialize, Serialize};

use crate::ids::{CustId, Load, Meters, NodeId, Tick, TripId, VehlId};

/// A point on the network, WGS84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
}

/// A waypoint: cumulative distance from the start of the route, plus the node reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wayp {
    pub dist: Meters,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopType {
    VehlOrig,
    VehlDest,
    CustOrig,
    CustDest,
}

/// A customer or vehicle origin/destination stop within a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub owner: TripId,
    pub loc: NodeId,
    pub kind: StopType,
    pub early: Tick,
    pub late: Tick,
    /// `None` until the stepper crosses this stop's node.
    pub visited_at: Option<Tick>,
}

impl Stop {
    pub fn new(owner: TripId, loc: NodeId, kind: StopType, early: Tick, late: Tick) -> Self {
        Self {
            owner,
            loc,
            kind,
            early,
            late,
            visited_at: None,
        }
    }

    pub fn is_origin(&self) -> bool {
        matches!(self.kind, StopType::VehlOrig | StopType::CustOrig)
    }
}

/// An ordered sequence of waypoints belonging to one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub owner: VehlId,
    pub data: Vec<Wayp>,
}

impl Route {
    pub fn new(owner: VehlId, data: Vec<Wayp>) -> Self {
        Self { owner, data }
    }

    pub fn node_at(&self, i: usize) -> NodeId {
        self.data[i].node
    }

    pub fn dist_at(&self, i: usize) -> Meters {
        self.data[i].dist
    }

    /// Total route cost: the cumulative distance of the last waypoint.
    pub fn cost(&self) -> Meters {
        self.data.last().map(|w| w.dist).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An ordered sequence of stops belonging to one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub owner: VehlId,
    pub data: Vec<Stop>,
}

impl Schedule {
    pub fn new(owner: VehlId, data: Vec<Stop>) -> Self {
        Self { owner, data }
    }

    pub fn front(&self) -> &Stop {
        &self.data[0]
    }

    pub fn at(&self, i: usize) -> &Stop {
        &self.data[i]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Base trip: identity, origin/destination, time window, load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub origin: NodeId,
    /// Taxi-mode vehicles use `None` (original's `destination = -1` sentinel).
    pub destination: Option<NodeId>,
    pub early: Tick,
    /// Taxi-mode vehicles use `None` (original's `late = -1` sentinel).
    pub late: Option<Tick>,
    pub load: Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerStatus {
    Waiting,
    Onboard,
    Arrived,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub trip: Trip,
    pub id: CustId,
    pub status: CustomerStatus,
    pub assigned_to: Option<VehlId>,
}

impl Customer {
    pub fn new(id: CustId, origin: NodeId, destination: NodeId, early: Tick, late: Tick, load: Load) -> Self {
        Self {
            trip: Trip {
                id: id.into(),
                origin,
                destination: Some(destination),
                early,
                late: Some(late),
                load,
            },
            id,
            status: CustomerStatus::Waiting,
            assigned_to: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Enroute,
    Arrived,
    /// A store-consistency violation was observed on this vehicle; it is excluded
    /// from stepping until a successful commit clears the condition.
    Quarantined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub trip: Trip,
    pub id: VehlId,
    pub route: Route,
    pub schedule: Schedule,
    pub idx_last_visited_node: usize,
    pub next_node_distance: Meters,
    pub queued: u32,
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn last_visited_node(&self) -> NodeId {
        self.route.node_at(self.idx_last_visited_node)
    }

    pub fn capacity(&self) -> Load {
        -self.trip.load
    }

    pub fn is_taxi_mode(&self) -> bool {
        self.trip.destination.is_none()
    }
}
