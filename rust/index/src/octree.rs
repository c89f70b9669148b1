// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-backed octree.
//!
//! Nodes live in a flat `Vec`; children are `u32` indices with a `NIL`
//! sentinel, so there are no ownership cycles and the structure is trivial
//! to serialize. A non-leaf always has all eight children allocated and
//! holds no points directly. Leaves split once their payload exceeds the
//! capacity, unless they sit at the maximum depth.

use nalgebra::Point3;

use planscan_core::Aabb;

use crate::error::{Error, Result};
use crate::heap::BoundedMaxHeap;
use crate::{IndexStats, QueryHit, NIL};

/// Depth limit; leaves at this depth hold any number of points.
pub const DEFAULT_MAX_DEPTH: u32 = 10;
/// Leaf payload size that triggers subdivision.
pub const DEFAULT_LEAF_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
struct Node {
    center: Point3<f32>,
    half_size: f32,
    children: [u32; 8],
    points: Vec<u32>,
    leaf: bool,
}

impl Node {
    fn new(center: Point3<f32>, half_size: f32) -> Self {
        Self {
            center,
            half_size,
            children: [NIL; 8],
            points: Vec::new(),
            leaf: true,
        }
    }

    fn aabb(&self) -> Aabb {
        let h = self.half_size;
        Aabb::new(
            Point3::new(self.center.x - h, self.center.y - h, self.center.z - h),
            Point3::new(self.center.x + h, self.center.y + h, self.center.z + h),
        )
    }
}

/// Octree over a snapshot of the cloud's positions.
///
/// The tree stores indices into the position array it was built from; it
/// does not observe later cloud mutations, so callers rebuild after any
/// change.
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<Node>,
    positions: Vec<Point3<f32>>,
    max_depth: u32,
    leaf_capacity: usize,
}

#[inline]
fn octant(center: &Point3<f32>, p: &Point3<f32>) -> usize {
    (p.x >= center.x) as usize | (((p.y >= center.y) as usize) << 1) | (((p.z >= center.z) as usize) << 2)
}

#[inline]
fn child_center(center: &Point3<f32>, half: f32, oct: usize) -> Point3<f32> {
    let q = half * 0.5;
    Point3::new(
        center.x + if oct & 1 != 0 { q } else { -q },
        center.y + if oct & 2 != 0 { q } else { -q },
        center.z + if oct & 4 != 0 { q } else { -q },
    )
}

impl Octree {
    /// Builds an octree with the default depth/capacity limits.
    pub fn build(positions: &[Point3<f32>]) -> Result<Self> {
        Self::build_with(positions, DEFAULT_MAX_DEPTH, DEFAULT_LEAF_CAPACITY)
    }

    pub fn build_with(
        positions: &[Point3<f32>],
        max_depth: u32,
        leaf_capacity: usize,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(Error::EmptyCloud);
        }
        let aabb = Aabb::from_points(positions.iter());
        let ext = aabb.extents();
        // A degenerate (flat or single-point) cloud still needs a positive box
        let half = (ext.x.max(ext.y).max(ext.z) * 0.5).max(1e-3);

        let mut tree = Self {
            nodes: vec![Node::new(aabb.center(), half)],
            positions: positions.to_vec(),
            max_depth,
            leaf_capacity,
        };
        for i in 0..tree.positions.len() {
            tree.insert_index(i as u32);
        }
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn position(&self, index: u32) -> &Point3<f32> {
        &self.positions[index as usize]
    }

    /// Inserts a new point, returning its index. The caller is responsible
    /// for keeping the backing cloud in sync.
    pub fn insert(&mut self, p: Point3<f32>) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(p);
        while !self.nodes[0].aabb().contains(&p) {
            self.grow_root(&p);
        }
        self.insert_index(index);
        index
    }

    /// Doubles the root box toward `p`; the old root becomes the matching
    /// octant of the new root, so every existing node keeps its box.
    fn grow_root(&mut self, p: &Point3<f32>) {
        let old_center = self.nodes[0].center;
        let old_half = self.nodes[0].half_size;
        let new_half = old_half * 2.0;
        let new_center = Point3::new(
            old_center.x + if p.x >= old_center.x { old_half } else { -old_half },
            old_center.y + if p.y >= old_center.y { old_half } else { -old_half },
            old_center.z + if p.z >= old_center.z { old_half } else { -old_half },
        );

        let moved = self.nodes.len() as u32;
        let old_root = std::mem::replace(&mut self.nodes[0], Node::new(new_center, new_half));
        self.nodes.push(old_root);
        self.nodes[0].leaf = false;

        let old_oct = octant(&new_center, &old_center);
        for oct in 0..8 {
            self.nodes[0].children[oct] = if oct == old_oct {
                moved
            } else {
                let idx = self.nodes.len() as u32;
                self.nodes
                    .push(Node::new(child_center(&new_center, new_half, oct), old_half));
                idx
            };
        }
        // Existing leaves are one level deeper now; keep their size limit.
        self.max_depth += 1;
    }

    fn insert_index(&mut self, index: u32) {
        let p = self.positions[index as usize];
        let mut node = 0usize;
        let mut depth = 0u32;
        loop {
            if self.nodes[node].leaf {
                self.nodes[node].points.push(index);
                if self.nodes[node].points.len() > self.leaf_capacity && depth < self.max_depth {
                    self.split(node);
                } else {
                    return;
                }
            }
            let oct = octant(&self.nodes[node].center, &p);
            node = self.nodes[node].children[oct] as usize;
            depth += 1;
        }
    }

    /// Turns a leaf into an interior node, redistributing its payload over
    /// the eight freshly allocated children.
    fn split(&mut self, node: usize) {
        let center = self.nodes[node].center;
        let half = self.nodes[node].half_size;
        let payload = std::mem::take(&mut self.nodes[node].points);

        let first_child = self.nodes.len() as u32;
        for oct in 0..8 {
            self.nodes
                .push(Node::new(child_center(&center, half, oct), half * 0.5));
        }
        let children = std::array::from_fn(|oct| first_child + oct as u32);
        self.nodes[node].children = children;
        self.nodes[node].leaf = false;

        for index in payload {
            let oct = octant(&center, &self.positions[index as usize]);
            self.nodes[children[oct] as usize].points.push(index);
        }
    }

    /// All points within `radius` of `center`, sorted by distance ascending
    /// (ties by index for a deterministic order).
    pub fn radius_query(&self, center: &Point3<f32>, radius: f32) -> Vec<QueryHit> {
        let mut hits = Vec::new();
        let r_sq = radius * radius;
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            if n.aabb().distance_sq(center) > r_sq {
                continue;
            }
            if n.leaf {
                for &i in &n.points {
                    let d_sq = (self.positions[i as usize] - center).norm_squared();
                    if d_sq <= r_sq {
                        hits.push(QueryHit {
                            index: i,
                            distance: d_sq.sqrt(),
                        });
                    }
                }
            } else {
                for &c in &n.children {
                    stack.push(c as usize);
                }
            }
        }
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        hits
    }

    /// The `k` nearest points, ascending by distance.
    pub fn knn_query(&self, query: &Point3<f32>, k: usize) -> Vec<QueryHit> {
        let mut heap = BoundedMaxHeap::new(k);
        if k > 0 {
            self.knn_visit(0, query, &mut heap);
        }
        heap.into_sorted()
    }

    fn knn_visit(&self, node: usize, query: &Point3<f32>, heap: &mut BoundedMaxHeap) {
        let n = &self.nodes[node];
        if heap.is_full() && n.aabb().distance_sq(query) > heap.worst_distance_sq() {
            return;
        }
        if n.leaf {
            for &i in &n.points {
                let d_sq = (self.positions[i as usize] - query).norm_squared();
                heap.push(i, d_sq);
            }
            return;
        }
        // Visit the child containing the query first, then the rest in
        // order of box distance.
        let mut order: [usize; 8] = std::array::from_fn(|i| i);
        let dist = |oct: usize| {
            self.nodes[n.children[oct] as usize]
                .aabb()
                .distance_sq(query)
        };
        order.sort_by(|&a, &b| dist(a).total_cmp(&dist(b)));
        for oct in order {
            self.knn_visit(n.children[oct] as usize, query, heap);
        }
    }

    /// Indices of points inside the query box, ascending.
    pub fn aabb_query(&self, query: &Aabb) -> Vec<u32> {
        let mut hits = Vec::new();
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            if !n.aabb().intersects(query) {
                continue;
            }
            if n.leaf {
                for &i in &n.points {
                    if query.contains(&self.positions[i as usize]) {
                        hits.push(i);
                    }
                }
            } else {
                for &c in &n.children {
                    stack.push(c as usize);
                }
            }
        }
        hits.sort_unstable();
        hits
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            points: self.positions.len(),
            nodes: self.nodes.len(),
            leaves: 0,
            max_depth: 0,
        };
        let mut stack = vec![(0usize, 0u32)];
        while let Some((node, depth)) = stack.pop() {
            let n = &self.nodes[node];
            stats.max_depth = stats.max_depth.max(depth);
            if n.leaf {
                stats.leaves += 1;
            } else {
                for &c in &n.children {
                    stack.push((c as usize, depth + 1));
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_positions(n: usize) -> Vec<Point3<f32>> {
        // Deterministic scattered points in a 10 m cube
        (0..n)
            .map(|i| {
                let f = i as f32;
                Point3::new(
                    (f * 0.618).fract() * 10.0,
                    (f * 0.414).fract() * 10.0,
                    (f * 0.732).fract() * 10.0,
                )
            })
            .collect()
    }

    #[test]
    fn build_rejects_empty() {
        assert!(matches!(Octree::build(&[]), Err(Error::EmptyCloud)));
    }

    #[test]
    fn interior_nodes_have_eight_children_and_no_points() {
        let tree = Octree::build(&grid_positions(500)).unwrap();
        for n in &tree.nodes {
            if n.leaf {
                assert_eq!(n.children, [NIL; 8]);
            } else {
                assert!(n.points.is_empty());
                assert!(n.children.iter().all(|&c| c != NIL));
            }
        }
    }

    #[test]
    fn radius_query_matches_brute_force() {
        let positions = grid_positions(800);
        let tree = Octree::build(&positions).unwrap();
        let center = Point3::new(5.0, 5.0, 5.0);
        let radius = 2.5;

        let hits = tree.radius_query(&center, radius);
        let expected: Vec<u32> = positions
            .iter()
            .enumerate()
            .filter(|(_, p)| (*p - center).norm() <= radius)
            .map(|(i, _)| i as u32)
            .collect();

        let mut got: Vec<u32> = hits.iter().map(|h| h.index).collect();
        got.sort_unstable();
        assert_eq!(got, expected);
        // Non-decreasing distance order
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn knn_matches_true_k_smallest() {
        let positions = grid_positions(400);
        let tree = Octree::build(&positions).unwrap();
        let query = Point3::new(3.0, 7.0, 1.0);
        let k = 15;

        let hits = tree.knn_query(&query, k);
        assert_eq!(hits.len(), k);

        let mut all: Vec<f32> = positions.iter().map(|p| (p - query).norm()).collect();
        all.sort_by(f32::total_cmp);
        for (hit, want) in hits.iter().zip(all.iter()) {
            assert!((hit.distance - want).abs() < 1e-5);
        }
    }

    #[test]
    fn knn_clamps_to_cloud_size() {
        let positions = grid_positions(5);
        let tree = Octree::build(&positions).unwrap();
        assert_eq!(tree.knn_query(&Point3::origin(), 50).len(), 5);
        assert!(tree.knn_query(&Point3::origin(), 0).is_empty());
    }

    #[test]
    fn aabb_query_matches_brute_force() {
        let positions = grid_positions(600);
        let tree = Octree::build(&positions).unwrap();
        let query = Aabb::new(Point3::new(2.0, 2.0, 2.0), Point3::new(6.0, 5.0, 8.0));

        let got = tree.aabb_query(&query);
        let expected: Vec<u32> = positions
            .iter()
            .enumerate()
            .filter(|(_, p)| query.contains(p))
            .map(|(i, _)| i as u32)
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn insert_then_query_sees_new_point() {
        let mut tree = Octree::build(&grid_positions(100)).unwrap();
        let p = Point3::new(20.0, 20.0, 20.0);
        let idx = tree.insert(p);
        let hits = tree.radius_query(&p, 0.1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, idx);
    }

    #[test]
    fn out_of_bounds_inserts_stay_queryable() {
        let positions = grid_positions(100);
        let mut tree = Octree::build(&positions).unwrap();

        // Far outside the original ~10 m box in different directions
        let extras = [
            Point3::new(45.0, 45.0, 45.0),
            Point3::new(-30.0, 5.0, 5.0),
            Point3::new(5.0, 90.0, -2.0),
        ];
        let ids: Vec<u32> = extras.iter().map(|&p| tree.insert(p)).collect();

        for (p, &id) in extras.iter().zip(&ids) {
            let hits = tree.radius_query(p, 0.1);
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].index, id);
            assert_eq!(tree.knn_query(p, 1)[0].index, id);
        }

        // Growth must not disturb the original payload
        let center = Point3::new(5.0, 5.0, 5.0);
        let got: Vec<u32> = {
            let mut v: Vec<u32> = tree
                .radius_query(&center, 2.5)
                .iter()
                .map(|h| h.index)
                .collect();
            v.sort_unstable();
            v
        };
        let expected: Vec<u32> = positions
            .iter()
            .enumerate()
            .filter(|(_, p)| (*p - center).norm() <= 2.5)
            .map(|(i, _)| i as u32)
            .collect();
        assert_eq!(got, expected);
        assert_eq!(tree.stats().points, 103);
    }

    #[test]
    fn depth_limit_is_respected() {
        // Many coincident points would otherwise split forever
        let positions = vec![Point3::new(1.0, 1.0, 1.0); 200];
        let tree = Octree::build(&positions).unwrap();
        let stats = tree.stats();
        assert!(stats.max_depth <= DEFAULT_MAX_DEPTH);
        assert_eq!(tree.radius_query(&positions[0], 0.01).len(), 200);
    }
}
