// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Level-of-detail pyramid over a point cloud.
//!
//! Each level halves the target point budget. Level sizes are monotone
//! non-increasing, and every level carries the viewer distance band it
//! serves. Bands double per level starting from the cloud's AABB diagonal.

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use tracing::info;

use planscan_core::{Aabb, Progress, Result};

use crate::octree::Octree;

/// Base voxel edge length at level 0; doubles per level.
const BASE_VOXEL_SIZE: f32 = 0.1;
/// Neighborhood radius for the importance density term.
const IMPORTANCE_RADIUS: f32 = 1.0;

/// How each reduced level is sampled from the full cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodStrategy {
    /// Every `step`-th point by index.
    Uniform,
    /// One centroid per occupied voxel cell; voxel size doubles per level.
    Voxel,
    /// Seeded random subset.
    Random,
    /// Top-N by local density plus a small height term.
    Importance,
}

impl LodStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uniform" => Some(Self::Uniform),
            "voxel" => Some(Self::Voxel),
            "random" => Some(Self::Random),
            "importance" => Some(Self::Importance),
            _ => None,
        }
    }
}

/// One reduced level of the pyramid.
#[derive(Debug, Clone)]
pub struct LodLevel {
    pub level: usize,
    pub points: Vec<Point3<f32>>,
    /// Achieved size ratio against the full cloud.
    pub reduction: f32,
    /// Viewer distance band `[min, max)` this level serves.
    pub band: (f32, f32),
    pub memory_bytes: usize,
}

#[derive(Debug)]
pub struct LodPyramid {
    levels: Vec<LodLevel>,
}

impl LodPyramid {
    /// Generates `level_count` reduced levels from `positions`.
    ///
    /// Levels are emitted coarsest-last; level k never holds more points
    /// than level k-1. `seed` only matters for [`LodStrategy::Random`].
    pub fn generate(
        positions: &[Point3<f32>],
        strategy: LodStrategy,
        level_count: usize,
        seed: u64,
        progress: &mut Progress<'_>,
    ) -> Result<Self> {
        if positions.is_empty() || level_count == 0 {
            return Ok(Self { levels: Vec::new() });
        }
        let bounds = Aabb::from_points(positions.iter());
        let diagonal = bounds.diagonal().max(1.0);
        let mut rng = StdRng::seed_from_u64(seed);
        // Importance scores are distance-independent, so rank once.
        let ranked = if strategy == LodStrategy::Importance {
            Some(importance_ranking(positions))
        } else {
            None
        };

        let mut levels = Vec::with_capacity(level_count);
        let mut prev_len = positions.len() + 1;
        for level in 0..level_count {
            let ratio = 0.5_f32.powi(level as i32);
            let target = ((positions.len() as f32 * ratio) as usize).max(1);
            let mut points = match strategy {
                LodStrategy::Uniform => uniform_sample(positions, target),
                LodStrategy::Voxel => {
                    voxel_sample(positions, BASE_VOXEL_SIZE * 2.0_f32.powi(level as i32))
                }
                LodStrategy::Random => random_sample(positions, target, &mut rng),
                LodStrategy::Importance => {
                    let ranked = ranked.as_ref().unwrap();
                    ranked[..target.min(ranked.len())]
                        .iter()
                        .map(|&i| positions[i as usize])
                        .collect()
                }
            };
            // Voxel counts can plateau once cells saturate; truncation keeps
            // level sizes monotone.
            if points.len() >= prev_len {
                points.truncate(prev_len - 1);
            }
            prev_len = points.len().max(1);

            let band_min = if level == 0 {
                0.0
            } else {
                diagonal * 2.0_f32.powi(level as i32 - 1)
            };
            let band_max = if level + 1 == level_count {
                f32::INFINITY
            } else {
                diagonal * 2.0_f32.powi(level as i32)
            };
            let memory_bytes = points.len() * std::mem::size_of::<Point3<f32>>();
            info!(
                level,
                points = points.len(),
                ratio = points.len() as f32 / positions.len() as f32,
                "lod level generated"
            );
            levels.push(LodLevel {
                level,
                reduction: points.len() as f32 / positions.len() as f32,
                band: (band_min, band_max),
                memory_bytes,
                points,
            });
            let percent = ((level + 1) * 100 / level_count) as u32;
            progress.report("lod", percent)?;
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    /// Level whose band contains `distance`; the coarsest level catches
    /// everything beyond the last threshold.
    pub fn select_level(&self, distance: f32) -> Option<&LodLevel> {
        self.levels
            .iter()
            .find(|l| distance >= l.band.0 && distance < l.band.1)
            .or(self.levels.last())
    }

    pub fn total_memory_bytes(&self) -> usize {
        self.levels.iter().map(|l| l.memory_bytes).sum()
    }
}

fn uniform_sample(positions: &[Point3<f32>], target: usize) -> Vec<Point3<f32>> {
    let step = positions.len() as f32 / target as f32;
    (0..target)
        .map(|i| (i as f32 * step) as usize)
        .filter(|&i| i < positions.len())
        .map(|i| positions[i])
        .collect()
}

fn voxel_sample(positions: &[Point3<f32>], voxel_size: f32) -> Vec<Point3<f32>> {
    let mut cells: FxHashMap<(i64, i64, i64), (Point3<f64>, usize)> = FxHashMap::default();
    let mut order: Vec<(i64, i64, i64)> = Vec::new();
    for p in positions {
        let key = (
            (p.x / voxel_size).floor() as i64,
            (p.y / voxel_size).floor() as i64,
            (p.z / voxel_size).floor() as i64,
        );
        let entry = cells.entry(key).or_insert_with(|| {
            order.push(key);
            (Point3::origin(), 0)
        });
        entry.0 += p.coords.cast::<f64>();
        entry.1 += 1;
    }
    // Cells emit in first-touch order so output is input-order deterministic.
    order
        .iter()
        .map(|key| {
            let (sum, count) = &cells[key];
            Point3::new(
                (sum.x / *count as f64) as f32,
                (sum.y / *count as f64) as f32,
                (sum.z / *count as f64) as f32,
            )
        })
        .collect()
}

fn random_sample(positions: &[Point3<f32>], target: usize, rng: &mut StdRng) -> Vec<Point3<f32>> {
    let mut indices: Vec<u32> = (0..positions.len() as u32).collect();
    indices.shuffle(rng);
    indices.truncate(target);
    indices.sort_unstable();
    indices.iter().map(|&i| positions[i as usize]).collect()
}

/// Point indices ranked by importance, best first.
///
/// Score is neighbor count within [`IMPORTANCE_RADIUS`] weighted 0.1, plus a
/// small height term so elevated structure survives aggressive reduction.
fn importance_ranking(positions: &[Point3<f32>]) -> Vec<u32> {
    let Ok(octree) = Octree::build(positions) else {
        return (0..positions.len() as u32).collect();
    };
    let mut scored: Vec<(f32, u32)> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let neighbors = octree.radius_query(p, IMPORTANCE_RADIUS).len() - 1;
            (neighbors as f32 * 0.1 + p.z * 0.01, i as u32)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, i)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab_cloud(n: usize) -> Vec<Point3<f32>> {
        (0..n)
            .map(|i| {
                let f = i as f32;
                Point3::new(f * 0.05, (f * 0.31).sin(), (f * 0.17).cos() * 0.5)
            })
            .collect()
    }

    #[test]
    fn level_sizes_monotone_all_strategies() {
        let pts = slab_cloud(2000);
        for strategy in [
            LodStrategy::Uniform,
            LodStrategy::Voxel,
            LodStrategy::Random,
            LodStrategy::Importance,
        ] {
            let pyramid =
                LodPyramid::generate(&pts, strategy, 4, 7, &mut Progress::none()).unwrap();
            let levels = pyramid.levels();
            assert_eq!(levels.len(), 4);
            for w in levels.windows(2) {
                assert!(
                    w[1].points.len() <= w[0].points.len(),
                    "{strategy:?}: level {} grew",
                    w[1].level
                );
            }
        }
    }

    #[test]
    fn voxel_centroids_unique_per_cell() {
        let pts = slab_cloud(500);
        let voxel = 0.4;
        let sampled = voxel_sample(&pts, voxel);
        let mut seen = rustc_hash::FxHashSet::default();
        for p in &sampled {
            let key = (
                (p.x / voxel).floor() as i64,
                (p.y / voxel).floor() as i64,
                (p.z / voxel).floor() as i64,
            );
            assert!(seen.insert(key), "two centroids in one voxel cell");
        }
    }

    #[test]
    fn random_sampling_is_seed_deterministic() {
        let pts = slab_cloud(800);
        let a = LodPyramid::generate(&pts, LodStrategy::Random, 3, 42, &mut Progress::none())
            .unwrap();
        let b = LodPyramid::generate(&pts, LodStrategy::Random, 3, 42, &mut Progress::none())
            .unwrap();
        for (la, lb) in a.levels().iter().zip(b.levels()) {
            assert_eq!(la.points, lb.points);
        }
    }

    #[test]
    fn band_selection_covers_all_distances() {
        let pts = slab_cloud(400);
        let pyramid =
            LodPyramid::generate(&pts, LodStrategy::Uniform, 3, 0, &mut Progress::none()).unwrap();
        let near = pyramid.select_level(0.0).unwrap();
        assert_eq!(near.level, 0);
        let far = pyramid.select_level(1.0e9).unwrap();
        assert_eq!(far.level, 2);
        for l in pyramid.levels() {
            assert!(l.band.0 < l.band.1);
        }
    }

    #[test]
    fn importance_keeps_dense_cluster() {
        // 50 points packed in a ball plus 50 isolated outliers.
        let mut pts = Vec::new();
        for i in 0..50 {
            let f = i as f32 * 0.01;
            pts.push(Point3::new(f, f * 0.5, 0.0));
        }
        for i in 0..50 {
            pts.push(Point3::new(100.0 + i as f32 * 10.0, 0.0, 0.0));
        }
        let ranked = importance_ranking(&pts);
        // All dense-cluster indices outrank all outliers.
        assert!(ranked[..50].iter().all(|&i| i < 50));
    }

    #[test]
    fn empty_input_yields_empty_pyramid() {
        let pyramid =
            LodPyramid::generate(&[], LodStrategy::Voxel, 4, 0, &mut Progress::none()).unwrap();
        assert!(pyramid.levels().is_empty());
        assert!(pyramid.select_level(1.0).is_none());
    }
}
