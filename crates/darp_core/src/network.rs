//! Road network & shortest-path oracle.
//!
//! Distances are integer meters. The oracle must be thread-safe for concurrent reads,
//! which a `Mutex`-guarded LRU cache in front of the real query gets for free (here,
//! Dijkstra via `pathfinding`, standing in for the original's G-tree).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use pathfinding::directed::dijkstra::dijkstra;

use crate::ids::{Meters, NodeId};
use crate::trip::Point;

/// Default LRU capacity for the shortest-path cache.
const DEFAULT_PATH_CACHE_CAPACITY: usize = 50_000;

/// Haversine distance between two points, in meters. A cheap underestimate of network
/// cost; never use this where a true shortest-path cost is required.
pub fn haversine_m(a: Point, b: Point) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// A static, undirected, weighted road network.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    /// adjacency[node] = [(neighbor, weight_m), ...]
    adjacency: Vec<Vec<(NodeId, Meters)>>,
    coordinates: Vec<Point>,
}

impl RoadNetwork {
    /// Build from an explicit node count, coordinates, and an edge list. Edges are
    /// added in both directions unless `directed` is set.
    pub fn new(coordinates: Vec<Point>, edges: &[(NodeId, NodeId, Meters)], directed: bool) -> Self {
        let n = coordinates.len();
        let mut adjacency = vec![Vec::new(); n];
        for &(from, to, weight) in edges {
            adjacency[from.0 as usize].push((to, weight));
            if !directed {
                adjacency[to.0 as usize].push((from, weight));
            }
        }
        Self {
            adjacency,
            coordinates,
        }
    }

    pub fn node_count(&self) -> usize {
        self.coordinates.len()
    }

    pub fn point_of(&self, node: NodeId) -> Point {
        self.coordinates[node.0 as usize]
    }

    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = self.coordinates[0];
        let mut max = self.coordinates[0];
        for p in &self.coordinates {
            min.lng = min.lng.min(p.lng);
            min.lat = min.lat.min(p.lat);
            max.lng = max.lng.max(p.lng);
            max.lat = max.lat.max(p.lat);
        }
        (min, max)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<(Vec<NodeId>, Meters)> {
        if from == to {
            return Some((vec![from], 0));
        }
        dijkstra(
            &from,
            |&node| self.adjacency[node.0 as usize].iter().copied(),
            |&node| node == to,
        )
    }
}

/// Trait for a shortest-path service. Implementations must be `Send + Sync` so the
/// oracle can be shared across the simulation and algorithm threads.
pub trait ShortestPathOracle: Send + Sync {
    /// Point-to-point shortest-path cost, in meters.
    fn distance(&self, u: NodeId, v: NodeId) -> Meters;

    /// The path itself, as an ordered sequence of nodes (inclusive of both ends).
    fn find_path(&self, u: NodeId, v: NodeId) -> Vec<NodeId>;

    /// The WGS84 coordinates of a node, for grid indexing and haversine pruning.
    fn point_of(&self, node: NodeId) -> Point;
}

/// Cached oracle backed by Dijkstra over a [`RoadNetwork`], guarded by a single mutex:
/// one global mutex around a hierarchical shortest-path index, with Dijkstra standing
/// in for the original's G-tree.
pub struct GtreeOracle {
    network: RoadNetwork,
    cache: Mutex<LruCache<(NodeId, NodeId), (Vec<NodeId>, Meters)>>,
}

impl GtreeOracle {
    pub fn new(network: RoadNetwork) -> Self {
        Self {
            network,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_PATH_CACHE_CAPACITY).expect("capacity > 0"),
            )),
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    fn query(&self, u: NodeId, v: NodeId) -> (Vec<NodeId>, Meters) {
        let key = (u, v);
        if let Some(hit) = self.cache.lock().expect("oracle cache poisoned").get(&key) {
            return hit.clone();
        }
        let result = self
            .network
            .shortest_path(u, v)
            .unwrap_or_else(|| (vec![u, v], Meters::MAX / 4));
        self.cache
            .lock()
            .expect("oracle cache poisoned")
            .put(key, result.clone());
        result
    }
}

impl ShortestPathOracle for GtreeOracle {
    fn distance(&self, u: NodeId, v: NodeId) -> Meters {
        self.query(u, v).1
    }

    fn find_path(&self, u: NodeId, v: NodeId) -> Vec<NodeId> {
        self.query(u, v).0
    }

    fn point_of(&self, node: NodeId) -> Point {
        self.network.point_of(node)
    }
}

/// Builds a [`RoadNetwork`] from the parsed contents of a `.rnet` file: one edge per
/// line, `edge_id from to from_lng from_lat to_lng to_lat`. Coordinates for a node
/// are taken from whichever edge line mentions it first; the `.edges` file supplies
/// the authoritative integer-meter weights separately (see `formats::edges`).
pub fn network_from_rnet_rows(rows: &[(u32, u32, u32, Point, Point)]) -> (RoadNetwork, HashMap<u32, NodeId>) {
    let mut index_of: HashMap<u32, NodeId> = HashMap::new();
    let mut coords: Vec<Point> = Vec::new();
    let mut intern = |raw: u32, point: Point, coords: &mut Vec<Point>| -> NodeId {
        if let Some(&id) = index_of.get(&raw) {
            return id;
        }
        let id = NodeId(coords.len() as u32);
        coords.push(point);
        index_of.insert(raw, id);
        id
    };
    let mut edges = Vec::with_capacity(rows.len());
    for &(_edge_id, from_raw, to_raw, from_pt, to_pt) in rows {
        let from = intern(from_raw, from_pt, &mut coords);
        let to = intern(to_raw, to_pt, &mut coords);
        let weight = haversine_m(from_pt, to_pt).round() as Meters;
        edges.push((from, to, weight));
    }
    (RoadNetwork::new(coords, &edges, false), index_of)
}
