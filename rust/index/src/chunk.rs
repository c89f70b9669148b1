// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chunked residency tracking with a byte budget.
//!
//! The cloud is partitioned into fixed-count chunks; each chunk knows its
//! AABB and load state. Loading past the budget evicts other chunks under
//! the configured policy until the budget holds again. Access ordering uses
//! a logical clock, not wall time, so eviction decisions replay identically.

use nalgebra::{Point3, Vector3};
use tracing::debug;

use planscan_core::{Aabb, Error, Result};

/// Default points per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

const BYTES_PER_POINT: usize = std::mem::size_of::<Point3<f32>>();

/// Ranking used when chunks must be unloaded to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Least recently accessed first.
    Lru,
    /// Fewest accesses first.
    Lfu,
    /// Earliest loaded first.
    Fifo,
    /// Lowest priority first.
    Priority,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    /// Index range into the source cloud.
    pub range: std::ops::Range<usize>,
    pub aabb: Aabb,
    pub memory_bytes: usize,
    pub priority: i32,
    pub loaded: bool,
    last_access: u64,
    access_count: u64,
    load_seq: u64,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(Debug)]
pub struct ChunkManager {
    chunks: Vec<Chunk>,
    policy: EvictionPolicy,
    budget_bytes: usize,
    resident_bytes: usize,
    clock: u64,
}

impl ChunkManager {
    /// Partitions `positions` into chunks of at most `chunk_size` points.
    /// All chunks start unloaded.
    pub fn partition(
        positions: &[Point3<f32>],
        chunk_size: usize,
        budget_bytes: usize,
        policy: EvictionPolicy,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(positions.len().div_ceil(chunk_size));
        let mut start = 0;
        while start < positions.len() {
            let end = (start + chunk_size).min(positions.len());
            chunks.push(Chunk {
                range: start..end,
                aabb: Aabb::from_points(&positions[start..end]),
                memory_bytes: (end - start) * BYTES_PER_POINT,
                priority: 0,
                loaded: false,
                last_access: 0,
                access_count: 0,
                load_seq: 0,
            });
            start = end;
        }
        Self {
            chunks,
            policy,
            budget_bytes,
            resident_bytes: 0,
            clock: 0,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    pub fn set_priority(&mut self, index: usize, priority: i32) {
        if let Some(c) = self.chunks.get_mut(index) {
            c.priority = priority;
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Records an access without changing residency.
    pub fn touch(&mut self, index: usize) {
        let now = self.tick();
        if let Some(c) = self.chunks.get_mut(index) {
            c.last_access = now;
            c.access_count += 1;
        }
    }

    /// Marks a chunk resident, evicting others as needed to stay within the
    /// byte budget. A chunk larger than the whole budget is a hard failure.
    pub fn load(&mut self, index: usize) -> Result<()> {
        let Some(chunk) = self.chunks.get(index) else {
            return Err(Error::InvalidInput(format!("chunk {index} out of range")));
        };
        let needed = chunk.memory_bytes;
        if needed > self.budget_bytes {
            return Err(Error::ResourceLimit(format!(
                "chunk of {needed} bytes exceeds memory budget of {} bytes",
                self.budget_bytes
            )));
        }
        if !self.chunks[index].loaded {
            if self.resident_bytes + needed > self.budget_bytes {
                let target = self.budget_bytes - needed;
                self.evict_to(target, Some(index));
            }
            let seq = self.tick();
            let c = &mut self.chunks[index];
            c.loaded = true;
            c.load_seq = seq;
            self.resident_bytes += needed;
        }
        self.touch(index);
        Ok(())
    }

    pub fn unload(&mut self, index: usize) {
        if let Some(c) = self.chunks.get_mut(index) {
            if c.loaded {
                c.loaded = false;
                self.resident_bytes -= c.memory_bytes;
            }
        }
    }

    /// Unloads chunks, worst-ranked first, until resident bytes do not
    /// exceed `target_bytes`. `keep` is never evicted.
    pub fn evict_to(&mut self, target_bytes: usize, keep: Option<usize>) {
        let mut candidates: Vec<usize> = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(i, c)| c.loaded && Some(*i) != keep)
            .map(|(i, _)| i)
            .collect();
        let policy = self.policy;
        candidates.sort_by_key(|&i| {
            let c = &self.chunks[i];
            match policy {
                EvictionPolicy::Lru => (c.last_access, i as u64),
                EvictionPolicy::Lfu => (c.access_count, i as u64),
                EvictionPolicy::Fifo => (c.load_seq, i as u64),
                // Sign-bit flip maps i64 ordering onto u64 ordering.
                EvictionPolicy::Priority => ((c.priority as i64 as u64) ^ (1u64 << 63), i as u64),
            }
        });
        for i in candidates {
            if self.resident_bytes <= target_bytes {
                break;
            }
            debug!(chunk = i, ?policy, "evicting chunk");
            self.unload(i);
        }
    }

    /// Chunks whose AABB center falls inside the view cone between the near
    /// and far planes.
    pub fn visible_in_cone(
        &self,
        view_position: &Point3<f32>,
        view_direction: &Vector3<f32>,
        fov_degrees: f32,
        near: f32,
        far: f32,
    ) -> Vec<usize> {
        let dir = view_direction.normalize();
        let half_angle = (fov_degrees * 0.5).to_radians();
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let to_chunk = c.aabb.center() - view_position;
                let distance = to_chunk.norm();
                if distance < near || distance > far {
                    return false;
                }
                if distance <= f32::EPSILON {
                    return true;
                }
                let cos = (to_chunk / distance).dot(&dir).clamp(-1.0, 1.0);
                cos.acos() <= half_angle
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Chunks whose AABB lies within `radius` of `focus`.
    pub fn within_distance(&self, focus: &Point3<f32>, radius: f32) -> Vec<usize> {
        let r_sq = radius * radius;
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.aabb.distance_sq(focus) <= r_sq)
            .map(|(i, _)| i)
            .collect()
    }
}
