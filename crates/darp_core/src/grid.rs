//! Uniform spatial grid over vehicle locations, for fast "vehicles near here" queries.
//!
//! Grounded in `original_source/include/libcargo/grid.h`: an `n x n` array of buckets
//! spanning the network's bounding box, hashed by `(hash_x, hash_y)`. The original uses
//! a hierarchical tree (`G-tree`) for path distances and this flat grid only for the
//! coarse candidate search that precedes calling into it — same division of labor here,
//! with [`GtreeOracle`](crate::network::GtreeOracle) standing in for the tree.

use std::collections::HashMap;

use crate::ids::VehlId;
use crate::network::haversine_m;
use crate::trip::Point;

/// A square `n x n` bucket grid over a fixed bounding box.
pub struct Grid {
    min: Point,
    max: Point,
    n: usize,
    cell_w: f64,
    cell_h: f64,
    buckets: Vec<Vec<VehlId>>,
    positions: HashMap<VehlId, Point>,
}

impl Grid {
    /// `n` buckets per side (total grid size is `n * n`), spanning `bounds`.
    pub fn new(n: usize, bounds: (Point, Point)) -> Self {
        let n = n.max(1);
        let (min, max) = bounds;
        let cell_w = ((max.lng - min.lng) / n as f64).max(f64::EPSILON);
        let cell_h = ((max.lat - min.lat) / n as f64).max(f64::EPSILON);
        Self {
            min,
            max,
            n,
            cell_w,
            cell_h,
            buckets: vec![Vec::new(); n * n],
            positions: HashMap::new(),
        }
    }

    fn hash_x(&self, p: Point) -> usize {
        (((p.lng - self.min.lng) / self.cell_w) as isize)
            .clamp(0, self.n as isize - 1) as usize
    }

    fn hash_y(&self, p: Point) -> usize {
        (((p.lat - self.min.lat) / self.cell_h) as isize)
            .clamp(0, self.n as isize - 1) as usize
    }

    fn hash(&self, p: Point) -> usize {
        self.hash_y(p) * self.n + self.hash_x(p)
    }

    /// Remove every vehicle from the grid, without changing its bucket layout.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.positions.clear();
    }

    /// Place (or move) a vehicle at `loc`. Idempotent: re-inserting the same id moves it.
    pub fn insert(&mut self, id: VehlId, loc: Point) {
        if let Some(&old) = self.positions.get(&id) {
            let old_bucket = self.hash(old);
            self.buckets[old_bucket].retain(|&v| v != id);
        }
        let bucket = self.hash(loc);
        self.buckets[bucket].push(id);
        self.positions.insert(id, loc);
    }

    pub fn remove(&mut self, id: VehlId) {
        if let Some(loc) = self.positions.remove(&id) {
            let bucket = self.hash(loc);
            self.buckets[bucket].retain(|&v| v != id);
        }
    }

    /// All vehicle ids whose straight-line distance to `center` is at most `radius_m`.
    /// Searches outward bucket rings until the ring's near edge exceeds `radius_m`, then
    /// filters the collected candidates with an exact haversine check.
    pub fn within_about(&self, radius_m: f64, center: Point) -> Vec<VehlId> {
        let cx = self.hash_x(center) as isize;
        let cy = self.hash_y(center) as isize;
        let cell_span_m = haversine_m(
            Point { lng: self.min.lng, lat: self.min.lat },
            Point {
                lng: self.min.lng + self.cell_w,
                lat: self.min.lat + self.cell_h,
            },
        )
        .max(1.0);
        let ring_budget = (radius_m / cell_span_m).ceil() as isize + 1;

        let mut seen = Vec::new();
        for ring in 0..=ring_budget {
            let mut any_in_bounds = false;
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue; // only the ring's perimeter, interior already visited
                    }
                    let (x, y) = (cx + dx, cy + dy);
                    if x < 0 || y < 0 || x >= self.n as isize || y >= self.n as isize {
                        continue;
                    }
                    any_in_bounds = true;
                    let bucket = y as usize * self.n + x as usize;
                    for &id in &self.buckets[bucket] {
                        if let Some(&p) = self.positions.get(&id) {
                            if haversine_m(center, p) <= radius_m {
                                seen.push(id);
                            }
                        }
                    }
                }
            }
            if !any_in_bounds && ring > 0 {
                break;
            }
        }
        seen.sort_by_key(|id| id.get());
        seen.dedup();
        seen
    }

    pub fn bounds(&self) -> (Point, Point) {
        (self.min, self.max)
    }
}
