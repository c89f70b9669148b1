// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seeded RANSAC detection loop for planes and cylinders.
//!
//! Detection runs in rounds. Each round searches the working pool for the
//! single best primitive: sample a minimal set, fit, count inliers within
//! `epsilon` whose normals agree above `normal_threshold`, then keep only
//! the largest connected component at `cluster_epsilon`. The iteration
//! count inside a round shrinks adaptively as better candidates raise the
//! estimated inlier ratio. Accepted inliers leave the pool before the next
//! round. All sampling draws from one caller-provided RNG, so a fixed seed
//! replays the exact same primitives.

use std::time::Instant;

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::seq::index::sample as sample_indices;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use planscan_core::{PointSample, Progress, Result};

use crate::cylinder::{Cylinder3, DetectedCylinder};
use crate::params::RansacParams;
use crate::plane::{DetectedPlane, Plane3};

/// Rounds attempted before the detector gives up on a pool.
pub const DETECTION_ROUNDS: usize = 20;

/// Detects planes in `samples`, best-first, until a round finds nothing.
pub fn detect_planes(
    samples: &[PointSample],
    params: &RansacParams,
    rng: &mut StdRng,
    progress: &mut Progress<'_>,
) -> Result<Vec<DetectedPlane>> {
    let started = Instant::now();
    let mut pool: Vec<u32> = (0..samples.len() as u32).collect();
    let mut accepted = Vec::new();

    for round in 0..DETECTION_ROUNDS {
        if pool.len() < params.min_points {
            break;
        }
        if started.elapsed() > params.timeout {
            warn!(round, "plane detection timed out, returning partial result");
            break;
        }
        let best = best_plane(samples, &pool, params, rng, &started);
        progress.report("ransac", ((round + 1) * 100 / DETECTION_ROUNDS) as u32)?;
        match best {
            Some(det) => {
                debug!(round, inliers = det.inliers.len(), "plane accepted");
                remove_from_pool(&mut pool, &det.inliers);
                accepted.push(det);
            }
            None => {
                debug!(round, "no plane met thresholds");
                break;
            }
        }
    }
    Ok(accepted)
}

/// Detects cylinders in `samples` with the same round structure as
/// [`detect_planes`].
pub fn detect_cylinders(
    samples: &[PointSample],
    params: &RansacParams,
    rng: &mut StdRng,
    progress: &mut Progress<'_>,
) -> Result<Vec<DetectedCylinder>> {
    let started = Instant::now();
    let mut pool: Vec<u32> = (0..samples.len() as u32).collect();
    let mut accepted = Vec::new();

    for round in 0..DETECTION_ROUNDS {
        if pool.len() < params.min_points {
            break;
        }
        if started.elapsed() > params.timeout {
            warn!(round, "cylinder detection timed out, returning partial result");
            break;
        }
        let best = best_cylinder(samples, &pool, params, rng, &started);
        progress.report("ransac-cylinder", ((round + 1) * 100 / DETECTION_ROUNDS) as u32)?;
        match best {
            Some(det) => {
                debug!(round, inliers = det.inliers.len(), "cylinder accepted");
                remove_from_pool(&mut pool, &det.inliers);
                accepted.push(det);
            }
            None => break,
        }
    }
    Ok(accepted)
}

fn best_plane(
    samples: &[PointSample],
    pool: &[u32],
    params: &RansacParams,
    rng: &mut StdRng,
    started: &Instant,
) -> Option<DetectedPlane> {
    let mut best: Option<DetectedPlane> = None;
    let mut bound = params.max_iterations;
    let mut iter = 0;
    while iter < bound {
        iter += 1;
        if iter % 64 == 0 && started.elapsed() > params.timeout {
            break;
        }
        let picks = sample_indices(rng, pool.len(), 3);
        let idx: Vec<usize> = picks.iter().map(|i| pool[i] as usize).collect();
        let pts: Vec<Point3<f64>> = idx
            .iter()
            .map(|&i| samples[i].position.cast::<f64>())
            .collect();
        let normals: Vec<_> = idx
            .iter()
            .map(|&i| samples[i].normal_or_zero().cast::<f64>())
            .collect();
        let Ok(candidate) = Plane3::from_triplet(
            [&pts[0], &pts[1], &pts[2]],
            [&normals[0], &normals[1], &normals[2]],
        ) else {
            continue;
        };

        let inliers: Vec<u32> = pool
            .par_iter()
            .copied()
            .filter(|&i| {
                let s = &samples[i as usize];
                let p = s.position.cast::<f64>();
                candidate.distance(&p) <= params.epsilon
                    && candidate
                        .normal
                        .dot(&s.normal_or_zero().cast::<f64>())
                        .abs()
                        >= params.normal_threshold
            })
            .collect();
        if inliers.len() < params.min_points {
            continue;
        }
        let component = largest_component(samples, &inliers, params.cluster_epsilon);
        if component.len() < params.min_points {
            continue;
        }
        if best.as_ref().map_or(true, |b| component.len() > b.inliers.len()) {
            let refit = candidate
                .refit(
                    component
                        .iter()
                        .map(|&i| samples[i as usize].position.cast::<f64>()),
                )
                .unwrap_or(candidate);
            // Shrink the iteration budget from the observed inlier ratio.
            let w = component.len() as f64 / pool.len() as f64;
            bound = bound.min(adaptive_bound(params.probability, w, 3, params.max_iterations));
            best = Some(DetectedPlane {
                plane: refit,
                inliers: component,
            });
        }
    }
    best
}

fn best_cylinder(
    samples: &[PointSample],
    pool: &[u32],
    params: &RansacParams,
    rng: &mut StdRng,
    started: &Instant,
) -> Option<DetectedCylinder> {
    let mut best: Option<DetectedCylinder> = None;
    let mut bound = params.max_iterations;
    let mut iter = 0;
    while iter < bound {
        iter += 1;
        if iter % 64 == 0 && started.elapsed() > params.timeout {
            break;
        }
        let picks = sample_indices(rng, pool.len(), 2);
        let a = pool[picks.index(0)] as usize;
        let b = pool[picks.index(1)] as usize;
        let Ok(candidate) = Cylinder3::from_pair(
            &samples[a].position.cast::<f64>(),
            &samples[a].normal_or_zero().cast::<f64>(),
            &samples[b].position.cast::<f64>(),
            &samples[b].normal_or_zero().cast::<f64>(),
        ) else {
            continue;
        };

        let inliers: Vec<u32> = pool
            .par_iter()
            .copied()
            .filter(|&i| {
                let s = &samples[i as usize];
                let p = s.position.cast::<f64>();
                candidate.distance(&p) <= params.epsilon
                    && candidate.normal_agreement(&p, &s.normal_or_zero().cast::<f64>())
                        >= params.normal_threshold
            })
            .collect();
        if inliers.len() < params.min_points {
            continue;
        }
        let component = largest_component(samples, &inliers, params.cluster_epsilon);
        if component.len() < params.min_points {
            continue;
        }
        if best.as_ref().map_or(true, |b| component.len() > b.inliers.len()) {
            let w = component.len() as f64 / pool.len() as f64;
            bound = bound.min(adaptive_bound(params.probability, w, 2, params.max_iterations));
            best = Some(DetectedCylinder {
                cylinder: candidate,
                inliers: component,
            });
        }
    }
    best
}

/// Standard adaptive RANSAC bound: iterations until the chance of having
/// missed a primitive with inlier ratio `w` drops below `1 - probability`.
fn adaptive_bound(probability: f64, w: f64, minimal_set: u32, cap: usize) -> usize {
    if w <= 0.0 {
        return cap;
    }
    let miss = 1.0 - w.powi(minimal_set as i32);
    if miss <= f64::EPSILON {
        return 1;
    }
    let n = (1.0 - probability).ln() / miss.ln();
    if !n.is_finite() || n >= cap as f64 {
        cap
    } else {
        n.ceil().max(1.0) as usize
    }
}

/// Largest connected component of `indices` under the `cluster_epsilon`
/// neighbor relation, computed on a uniform grid.
pub(crate) fn largest_component(
    samples: &[PointSample],
    indices: &[u32],
    cluster_epsilon: f64,
) -> Vec<u32> {
    if indices.len() <= 1 || cluster_epsilon <= 0.0 {
        return indices.to_vec();
    }
    let eps = cluster_epsilon as f32;
    let eps_sq = eps * eps;
    let cell_of = |i: u32| {
        let p = &samples[i as usize].position;
        (
            (p.x / eps).floor() as i64,
            (p.y / eps).floor() as i64,
            (p.z / eps).floor() as i64,
        )
    };
    let mut grid: FxHashMap<(i64, i64, i64), Vec<usize>> = FxHashMap::default();
    for (slot, &i) in indices.iter().enumerate() {
        grid.entry(cell_of(i)).or_default().push(slot);
    }

    let mut visited = vec![false; indices.len()];
    let mut best: Vec<u32> = Vec::new();
    let mut stack = Vec::new();
    for start in 0..indices.len() {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        visited[start] = true;
        stack.push(start);
        while let Some(slot) = stack.pop() {
            component.push(indices[slot]);
            let p = samples[indices[slot] as usize].position;
            let (cx, cy, cz) = cell_of(indices[slot]);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(neighbors) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &other in neighbors {
                            if visited[other] {
                                continue;
                            }
                            let q = samples[indices[other] as usize].position;
                            if (q - p).norm_squared() <= eps_sq {
                                visited[other] = true;
                                stack.push(other);
                            }
                        }
                    }
                }
            }
        }
        if component.len() > best.len() {
            best = component;
        }
    }
    best.sort_unstable();
    best
}

fn remove_from_pool(pool: &mut Vec<u32>, taken: &[u32]) {
    // `taken` is sorted, so membership is a binary search.
    pool.retain(|i| taken.binary_search(i).is_err());
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use planscan_core::Error;
    use rand::SeedableRng;

    fn wall_patch(
        out: &mut Vec<PointSample>,
        origin: [f32; 3],
        du: [f32; 3],
        dv: [f32; 3],
        nu: usize,
        nv: usize,
        normal: [f32; 3],
        label: u32,
    ) {
        for i in 0..nu {
            for j in 0..nv {
                out.push(PointSample {
                    position: Point3::new(
                        origin[0] + du[0] * i as f32 + dv[0] * j as f32,
                        origin[1] + du[1] * i as f32 + dv[1] * j as f32,
                        origin[2] + du[2] * i as f32 + dv[2] * j as f32,
                    ),
                    normal: Some(Vector3::new(normal[0], normal[1], normal[2])),
                    label,
                });
            }
        }
    }

    fn small_params() -> RansacParams {
        RansacParams::default().with_min_points(200)
    }

    #[test]
    fn finds_single_wall_plane() {
        let mut pts = Vec::new();
        // 10 m x 3 m wall in the y=0 plane at 0.1 m spacing.
        wall_patch(
            &mut pts,
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.0, 0.1],
            100,
            30,
            [0.0, 1.0, 0.0],
            0,
        );
        let mut rng = StdRng::seed_from_u64(42);
        let planes = detect_planes(&pts, &small_params(), &mut rng, &mut Progress::none()).unwrap();
        assert_eq!(planes.len(), 1);
        let plane = &planes[0];
        assert_eq!(plane.inliers.len(), pts.len());
        assert!(plane.plane.is_vertical(0.08));
        approx::assert_relative_eq!(plane.plane.normal.y.abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn separates_two_parallel_walls() {
        let mut pts = Vec::new();
        wall_patch(
            &mut pts,
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.0, 0.1],
            100,
            30,
            [0.0, 1.0, 0.0],
            0,
        );
        wall_patch(
            &mut pts,
            [0.0, 10.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.0, 0.1],
            100,
            30,
            [0.0, -1.0, 0.0],
            0,
        );
        let mut rng = StdRng::seed_from_u64(7);
        let planes = detect_planes(&pts, &small_params(), &mut rng, &mut Progress::none()).unwrap();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].inliers.len(), 3000);
        assert_eq!(planes[1].inliers.len(), 3000);
    }

    #[test]
    fn inliers_lie_within_epsilon() {
        let mut pts = Vec::new();
        wall_patch(
            &mut pts,
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.0, 0.1],
            60,
            30,
            [1.0, 0.0, 0.0],
            0,
        );
        let params = small_params();
        let mut rng = StdRng::seed_from_u64(1);
        let planes = detect_planes(&pts, &params, &mut rng, &mut Progress::none()).unwrap();
        for det in &planes {
            for &i in &det.inliers {
                let p = pts[i as usize].position.cast::<f64>();
                assert!(det.plane.distance(&p) <= params.epsilon);
            }
        }
    }

    #[test]
    fn detection_is_seed_deterministic() {
        let mut pts = Vec::new();
        wall_patch(
            &mut pts,
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.0, 0.1],
            100,
            30,
            [0.0, 1.0, 0.0],
            0,
        );
        wall_patch(
            &mut pts,
            [0.0, 0.0, 0.0],
            [0.0, 0.1, 0.0],
            [0.0, 0.0, 0.1],
            100,
            30,
            [1.0, 0.0, 0.0],
            1,
        );
        let run = || {
            let mut rng = StdRng::seed_from_u64(42);
            detect_planes(&pts, &small_params(), &mut rng, &mut Progress::none()).unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.inliers, y.inliers);
            assert_eq!(x.plane.normal, y.plane.normal);
            assert_eq!(x.plane.offset, y.plane.offset);
        }
    }

    #[test]
    fn cancellation_stops_detection() {
        let mut pts = Vec::new();
        wall_patch(
            &mut pts,
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.0, 0.1],
            100,
            30,
            [0.0, 1.0, 0.0],
            0,
        );
        let mut cb = |_: planscan_core::ProgressEvent<'_>| planscan_core::Flow::Cancel;
        let mut progress = Progress::new(&mut cb);
        let mut rng = StdRng::seed_from_u64(0);
        let r = detect_planes(&pts, &small_params(), &mut rng, &mut progress);
        assert!(matches!(r, Err(Error::Cancelled)));
    }

    #[test]
    fn finds_vertical_cylinder() {
        // Shell of radius 0.5 around (5, 5), z in [0, 3].
        let mut pts = Vec::new();
        for k in 0..30 {
            for s in 0..64 {
                let theta = s as f32 * std::f32::consts::TAU / 64.0;
                let (sin, cos) = theta.sin_cos();
                pts.push(PointSample {
                    position: Point3::new(5.0 + 0.5 * cos, 5.0 + 0.5 * sin, k as f32 * 0.1),
                    normal: Some(Vector3::new(cos, sin, 0.0)),
                    label: 0,
                });
            }
        }
        let mut rng = StdRng::seed_from_u64(3);
        let cyls =
            detect_cylinders(&pts, &small_params(), &mut rng, &mut Progress::none()).unwrap();
        assert_eq!(cyls.len(), 1);
        let cyl = &cyls[0].cylinder;
        assert!((cyl.radius - 0.5).abs() <= 0.02);
        assert!(cyl.axis_verticality() > 0.99);
    }

    #[test]
    fn largest_component_splits_disjoint_clusters() {
        let mut pts = Vec::new();
        for i in 0..30 {
            pts.push(PointSample {
                position: Point3::new(i as f32 * 0.1, 0.0, 0.0),
                normal: None,
                label: 0,
            });
        }
        for i in 0..10 {
            pts.push(PointSample {
                position: Point3::new(100.0 + i as f32 * 0.1, 0.0, 0.0),
                normal: None,
                label: 0,
            });
        }
        let all: Vec<u32> = (0..40).collect();
        let comp = largest_component(&pts, &all, 0.5);
        assert_eq!(comp, (0..30).collect::<Vec<u32>>());
    }

    #[test]
    fn adaptive_bound_shrinks_with_inlier_ratio() {
        let high = adaptive_bound(0.99, 0.9, 3, 1024);
        let low = adaptive_bound(0.99, 0.1, 3, 1024);
        assert!(high < 10);
        assert_eq!(low, 1024);
    }
}
