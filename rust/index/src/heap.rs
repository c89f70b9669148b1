// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded max-heap of candidate neighbors, keyed by squared distance.
//! Shared by the octree and k-d k-NN queries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::QueryHit;

#[derive(Debug, Clone, Copy)]
struct Entry {
    index: u32,
    distance_sq: f32,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties by index keep the heap order (and thus results) deterministic
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Keeps the `k` smallest-distance entries seen so far.
#[derive(Debug)]
pub struct BoundedMaxHeap {
    heap: BinaryHeap<Entry>,
    capacity: usize,
}

impl BoundedMaxHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Squared distance of the current worst kept entry; infinity while the
    /// heap is not yet full.
    #[inline]
    pub fn worst_distance_sq(&self) -> f32 {
        if self.is_full() {
            self.heap.peek().map_or(f32::INFINITY, |e| e.distance_sq)
        } else {
            f32::INFINITY
        }
    }

    pub fn push(&mut self, index: u32, distance_sq: f32) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Entry { index, distance_sq });
        } else if distance_sq < self.worst_distance_sq() {
            self.heap.pop();
            self.heap.push(Entry { index, distance_sq });
        }
    }

    /// Drains into hits sorted ascending by distance.
    pub fn into_sorted(self) -> Vec<QueryHit> {
        let mut entries = self.heap.into_sorted_vec();
        entries
            .drain(..)
            .map(|e| QueryHit {
                index: e.index,
                distance: e.distance_sq.sqrt(),
            })
            .collect()
    }
}
