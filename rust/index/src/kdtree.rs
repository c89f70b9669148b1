// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Balanced k-d tree over a position snapshot.
//!
//! Built once by recursive median split on the cycling axis; no insertion.
//! Flat node arena with `u32` links, [`NIL`] for absent children.

use nalgebra::Point3;
use planscan_core::Aabb;

use crate::error::{Error, Result};
use crate::heap::BoundedMaxHeap;
use crate::{IndexStats, QueryHit, NIL};

#[derive(Debug, Clone, Copy)]
struct Node {
    /// Index into the position snapshot.
    point: u32,
    /// Split axis, 0..3.
    axis: u8,
    left: u32,
    right: u32,
}

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<Node>,
    positions: Vec<Point3<f32>>,
    root: u32,
    max_depth: u32,
}

impl KdTree {
    /// Builds a balanced tree over a copy of `positions`.
    pub fn build(positions: &[Point3<f32>]) -> Result<Self> {
        if positions.is_empty() {
            return Err(Error::EmptyCloud);
        }
        let mut tree = Self {
            nodes: Vec::with_capacity(positions.len()),
            positions: positions.to_vec(),
            root: NIL,
            max_depth: 0,
        };
        let mut order: Vec<u32> = (0..positions.len() as u32).collect();
        tree.root = tree.build_recursive(&mut order, 0);
        Ok(tree)
    }

    fn build_recursive(&mut self, order: &mut [u32], depth: u32) -> u32 {
        if order.is_empty() {
            return NIL;
        }
        self.max_depth = self.max_depth.max(depth);
        let axis = (depth % 3) as u8;
        let mid = order.len() / 2;
        let positions = &self.positions;
        order.select_nth_unstable_by(mid, |&a, &b| {
            positions[a as usize][axis as usize]
                .total_cmp(&positions[b as usize][axis as usize])
                .then_with(|| a.cmp(&b))
        });
        let point = order[mid];
        let id = self.nodes.len() as u32;
        self.nodes.push(Node {
            point,
            axis,
            left: NIL,
            right: NIL,
        });
        let (lo, hi) = order.split_at_mut(mid);
        let left = self.build_recursive(lo, depth + 1);
        let right = self.build_recursive(&mut hi[1..], depth + 1);
        self.nodes[id as usize].left = left;
        self.nodes[id as usize].right = right;
        id
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All points within `radius` of `center`, ascending by distance.
    pub fn radius_query(&self, center: &Point3<f32>, radius: f32) -> Vec<QueryHit> {
        let mut hits = Vec::new();
        if radius >= 0.0 {
            self.radius_visit(self.root, center, radius * radius, &mut hits);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        hits
    }

    fn radius_visit(
        &self,
        node: u32,
        center: &Point3<f32>,
        radius_sq: f32,
        hits: &mut Vec<QueryHit>,
    ) {
        if node == NIL {
            return;
        }
        let n = &self.nodes[node as usize];
        let p = &self.positions[n.point as usize];
        let d_sq = (p - center).norm_squared();
        if d_sq <= radius_sq {
            hits.push(QueryHit {
                index: n.point,
                distance: d_sq.sqrt(),
            });
        }
        let delta = center[n.axis as usize] - p[n.axis as usize];
        let (near, far) = if delta < 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        self.radius_visit(near, center, radius_sq, hits);
        // The far half-space can only contribute when the splitting plane is
        // within the search radius.
        if delta * delta <= radius_sq {
            self.radius_visit(far, center, radius_sq, hits);
        }
    }

    /// The `k` nearest points to `center`, ascending by distance.
    pub fn knn_query(&self, center: &Point3<f32>, k: usize) -> Vec<QueryHit> {
        let mut heap = BoundedMaxHeap::new(k.min(self.positions.len()));
        self.knn_visit(self.root, center, &mut heap);
        heap.into_sorted()
    }

    fn knn_visit(&self, node: u32, center: &Point3<f32>, heap: &mut BoundedMaxHeap) {
        if node == NIL {
            return;
        }
        let n = &self.nodes[node as usize];
        let p = &self.positions[n.point as usize];
        heap.push(n.point, (p - center).norm_squared());
        let delta = center[n.axis as usize] - p[n.axis as usize];
        let (near, far) = if delta < 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        self.knn_visit(near, center, heap);
        if delta * delta < heap.worst_distance_sq() {
            self.knn_visit(far, center, heap);
        }
    }

    /// Indices of all points inside `aabb`, ascending.
    pub fn aabb_query(&self, aabb: &Aabb) -> Vec<u32> {
        let mut out = Vec::new();
        self.aabb_visit(self.root, aabb, &mut out);
        out.sort_unstable();
        out
    }

    fn aabb_visit(&self, node: u32, aabb: &Aabb, out: &mut Vec<u32>) {
        if node == NIL {
            return;
        }
        let n = &self.nodes[node as usize];
        let p = &self.positions[n.point as usize];
        if aabb.contains(p) {
            out.push(n.point);
        }
        let axis = n.axis as usize;
        let split = p[axis];
        if aabb.min[axis] <= split {
            self.aabb_visit(n.left, aabb, out);
        }
        if aabb.max[axis] >= split {
            self.aabb_visit(n.right, aabb, out);
        }
    }

    pub fn stats(&self) -> IndexStats {
        let leaves = self
            .nodes
            .iter()
            .filter(|n| n.left == NIL && n.right == NIL)
            .count();
        IndexStats {
            points: self.positions.len(),
            nodes: self.nodes.len(),
            leaves,
            max_depth: self.max_depth,
        }
    }
}
