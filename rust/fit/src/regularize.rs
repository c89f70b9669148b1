// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall list regularization: length filtering, collinear merging,
//! intersection snapping, and optional orthogonality correction.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wall::WallSegment;

/// Regularization thresholds, meters and degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularizeConfig {
    /// Walls shorter than this are dropped.
    pub min_wall_length: f64,
    /// Max direction angle for a merge.
    pub angle_threshold_deg: f64,
    /// Max perpendicular separation for a merge.
    pub merge_dist: f64,
    /// Max axis gap between merge candidates.
    pub join_gap: f64,
    /// Parameter-range extension when snapping intersections.
    pub snap_extend: f64,
    /// Disk radius for multi-way corner snapping.
    pub snap_radius: f64,
    /// Max rotation for the orthogonality pass.
    pub ortho_tolerance_deg: f64,
    /// Whether to run the orthogonality pass at all.
    pub orthogonalize: bool,
}

impl Default for RegularizeConfig {
    fn default() -> Self {
        Self {
            min_wall_length: 1.0,
            angle_threshold_deg: 5.0,
            merge_dist: 0.15,
            join_gap: 0.3,
            snap_extend: 0.1,
            snap_radius: 0.1,
            ortho_tolerance_deg: 3.0,
            orthogonalize: false,
        }
    }
}

/// Runs the full regularization pass over `walls`.
pub fn regularize(mut walls: Vec<WallSegment>, config: &RegularizeConfig) -> Vec<WallSegment> {
    let before = walls.len();
    walls.retain(|w| w.length() >= config.min_wall_length);
    debug!(dropped = before - walls.len(), "short walls removed");

    merge_collinear(&mut walls, config);
    snap_intersections(&mut walls, config);
    if config.orthogonalize {
        orthogonalize(&mut walls, config);
    }
    walls
}

/// Merges near-parallel, near-collinear, overlapping-or-close pairs until a
/// fixpoint.
pub fn merge_collinear(walls: &mut Vec<WallSegment>, config: &RegularizeConfig) {
    let min_cos = config.angle_threshold_deg.to_radians().cos();
    loop {
        let mut merged_any = false;
        'outer: for i in 0..walls.len() {
            for j in (i + 1)..walls.len() {
                if let Some(merged) = try_merge(&walls[i], &walls[j], min_cos, config) {
                    debug!(a = walls[i].id, b = walls[j].id, "merged collinear walls");
                    walls.remove(j);
                    walls[i] = merged;
                    merged_any = true;
                    break 'outer;
                }
            }
        }
        if !merged_any {
            break;
        }
    }
}

fn try_merge(
    a: &WallSegment,
    b: &WallSegment,
    min_cos: f64,
    config: &RegularizeConfig,
) -> Option<WallSegment> {
    let da = a.direction();
    let db = b.direction();
    if da.dot(&db).abs() < min_cos {
        return None;
    }

    let wa = a.supports.len().max(1) as f64;
    let wb = b.supports.len().max(1) as f64;

    // Common axis: inlier-weighted mean direction, signs aligned.
    let db_aligned = if da.dot(&db) < 0.0 { -db } else { db };
    let axis = (da * wa + db_aligned * wb).normalize();
    let anchor = Point2::from(
        (a.start_2d().coords + a.end_2d().coords) * wa * 0.5
            + (b.start_2d().coords + b.end_2d().coords) * wb * 0.5,
    ) / (wa + wb);

    // Perpendicular separation of the two supporting lines.
    let sep = {
        let mid_b = Point2::from((b.start_2d().coords + b.end_2d().coords) * 0.5);
        let mid_a = Point2::from((a.start_2d().coords + a.end_2d().coords) * 0.5);
        let rel = mid_b - mid_a;
        (rel - axis * rel.dot(&axis)).norm()
    };
    if sep > config.merge_dist {
        return None;
    }

    // Project all four endpoints onto the common axis.
    let param = |p: Point2<f64>| axis.dot(&(p - anchor));
    let (a0, a1) = ordered(param(a.start_2d()), param(a.end_2d()));
    let (b0, b1) = ordered(param(b.start_2d()), param(b.end_2d()));
    let gap = (b0 - a1).max(a0 - b1);
    if gap > config.join_gap {
        return None;
    }

    let lo = a0.min(b0);
    let hi = a1.max(b1);
    let start = anchor + axis * lo;
    let end = anchor + axis * hi;

    // The stronger wall donates id, z level, and plan normal orientation.
    let (lead, tail) = if wa >= wb { (a, b) } else { (b, a) };
    let mut normal = Vector2::new(-axis.y, axis.x);
    if normal.dot(&lead.normal) < 0.0 {
        normal = -normal;
    }
    let mut supports = lead.supports.clone();
    supports.extend_from_slice(&tail.supports);
    let mut stroke_ids = lead.stroke_ids.clone();
    for id in &tail.stroke_ids {
        if !stroke_ids.contains(id) {
            stroke_ids.push(*id);
        }
    }

    Some(WallSegment {
        id: lead.id,
        start: nalgebra::Point3::new(start.x, start.y, lead.start.z),
        end: nalgebra::Point3::new(end.x, end.y, lead.start.z),
        normal,
        thickness: (a.thickness * wa + b.thickness * wb) / (wa + wb),
        height: (a.height * wa + b.height * wb) / (wa + wb),
        supports,
        stroke_ids,
        confidence: (a.confidence * wa + b.confidence * wb) / (wa + wb),
        created_at: lead.created_at,
    })
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Moves endpoints of intersecting pairs to their intersection point, then
/// collapses corners where three or more segments meet.
pub fn snap_intersections(walls: &mut [WallSegment], config: &RegularizeConfig) {
    for i in 0..walls.len() {
        for j in (i + 1)..walls.len() {
            let Some(p) = segment_intersection(&walls[i], &walls[j], config.snap_extend) else {
                continue;
            };
            move_nearest_endpoint(&mut walls[i], &p);
            move_nearest_endpoint(&mut walls[j], &p);
        }
    }

    // Multi-way corners: cluster endpoints within the snap radius and
    // replace clusters touching three or more walls with their centroid.
    let mut endpoints: Vec<(usize, bool, Point2<f64>)> = Vec::new();
    for (wi, w) in walls.iter().enumerate() {
        endpoints.push((wi, true, w.start_2d()));
        endpoints.push((wi, false, w.end_2d()));
    }
    let mut used = vec![false; endpoints.len()];
    for i in 0..endpoints.len() {
        if used[i] {
            continue;
        }
        let mut cluster = vec![i];
        for j in (i + 1)..endpoints.len() {
            if !used[j] && (endpoints[j].2 - endpoints[i].2).norm() <= config.snap_radius {
                cluster.push(j);
            }
        }
        let mut wall_set: Vec<usize> = cluster.iter().map(|&k| endpoints[k].0).collect();
        wall_set.sort_unstable();
        wall_set.dedup();
        if wall_set.len() < 3 {
            continue;
        }
        let centroid = Point2::from(
            cluster
                .iter()
                .fold(Vector2::zeros(), |acc, &k| acc + endpoints[k].2.coords)
                / cluster.len() as f64,
        );
        for &k in &cluster {
            used[k] = true;
            let (wi, is_start, _) = endpoints[k];
            let w = &mut walls[wi];
            if is_start {
                w.start.x = centroid.x;
                w.start.y = centroid.y;
            } else {
                w.end.x = centroid.x;
                w.end.y = centroid.y;
            }
        }
    }
}

/// Intersection of the supporting lines, accepted when it lies within both
/// segments' parameter ranges extended by `extend` at each end.
fn segment_intersection(
    a: &WallSegment,
    b: &WallSegment,
    extend: f64,
) -> Option<Point2<f64>> {
    let p = a.start_2d();
    let r = a.end_2d() - p;
    let q = b.start_2d();
    let s = b.end_2d() - q;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let rel = q - p;
    let t = (rel.x * s.y - rel.y * s.x) / denom;
    let u = (rel.x * r.y - rel.y * r.x) / denom;
    let t_pad = extend / r.norm();
    let u_pad = extend / s.norm();
    if t < -t_pad || t > 1.0 + t_pad || u < -u_pad || u > 1.0 + u_pad {
        return None;
    }
    Some(p + r * t)
}

fn move_nearest_endpoint(wall: &mut WallSegment, p: &Point2<f64>) {
    let ds = (wall.start_2d() - p).norm();
    let de = (wall.end_2d() - p).norm();
    if ds <= de {
        wall.start.x = p.x;
        wall.start.y = p.y;
    } else {
        wall.end.x = p.x;
        wall.end.y = p.y;
    }
}

/// Rotates nearly perpendicular pairs symmetrically about their
/// intersection so they meet at exactly 90 degrees.
pub fn orthogonalize(walls: &mut [WallSegment], config: &RegularizeConfig) {
    let tol = config.ortho_tolerance_deg.to_radians();
    for i in 0..walls.len() {
        for j in (i + 1)..walls.len() {
            let Some(center) = segment_intersection(&walls[i], &walls[j], config.snap_extend)
            else {
                continue;
            };
            let di = walls[i].direction();
            let dj = walls[j].direction();
            let angle = di.dot(&dj).abs().clamp(0.0, 1.0).acos();
            let deficit = std::f64::consts::FRAC_PI_2 - angle;
            if deficit.abs() < 1e-12 || deficit.abs() > tol {
                continue;
            }
            // Split the correction between the two walls.
            let half = deficit * 0.5;
            let signed = if cross_z(&di, &dj) >= 0.0 { 1.0 } else { -1.0 };
            rotate_about(&mut walls[i], &center, -half * signed);
            rotate_about(&mut walls[j], &center, half * signed);
        }
    }
}

fn cross_z(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn rotate_about(wall: &mut WallSegment, center: &Point2<f64>, angle: f64) {
    let (sin, cos) = angle.sin_cos();
    let rot = |p: Point2<f64>| {
        let rel = p - center;
        Point2::new(
            center.x + rel.x * cos - rel.y * sin,
            center.y + rel.x * sin + rel.y * cos,
        )
    };
    let s = rot(wall.start_2d());
    let e = rot(wall.end_2d());
    wall.start.x = s.x;
    wall.start.y = s.y;
    wall.end.x = e.x;
    wall.end.y = e.y;
    let n3 = Vector2::new(
        wall.normal.x * cos - wall.normal.y * sin,
        wall.normal.x * sin + wall.normal.y * cos,
    );
    wall.normal = n3;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use std::time::SystemTime;

    fn wall(id: u32, start: [f64; 2], end: [f64; 2], supports: usize) -> WallSegment {
        let dir = Vector2::new(end[0] - start[0], end[1] - start[1]).normalize();
        WallSegment {
            id,
            start: Point3::new(start[0], start[1], 0.0),
            end: Point3::new(end[0], end[1], 0.0),
            normal: Vector2::new(-dir.y, dir.x),
            thickness: 0.1,
            height: 3.0,
            supports: (0..supports as u32).collect(),
            stroke_ids: vec![id],
            confidence: 0.9,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn short_walls_are_dropped() {
        let walls = vec![
            wall(0, [0.0, 0.0], [0.5, 0.0], 100),
            wall(1, [0.0, 0.0], [5.0, 0.0], 100),
        ];
        let out = regularize(walls, &RegularizeConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn near_collinear_pair_merges_to_span() {
        // Scenario: strokes (0,0)->(5,0) and (5.2,0.05)->(10,0).
        let walls = vec![
            wall(0, [0.0, 0.0], [5.0, 0.0], 500),
            wall(1, [5.2, 0.05], [10.0, 0.0], 400),
        ];
        let out = regularize(walls, &RegularizeConfig::default());
        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert!(m.length() >= 9.8 && m.length() <= 10.2, "length {}", m.length());
        assert_eq!(m.supports.len(), 900);
        assert_eq!(m.stroke_ids, vec![0, 1]);
    }

    #[test]
    fn distant_parallel_walls_stay_separate() {
        let walls = vec![
            wall(0, [0.0, 0.0], [10.0, 0.0], 100),
            wall(1, [0.0, 5.0], [10.0, 5.0], 100),
        ];
        let out = regularize(walls, &RegularizeConfig::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn no_merge_candidates_remain_after_fixpoint() {
        let config = RegularizeConfig::default();
        let min_cos = config.angle_threshold_deg.to_radians().cos();
        let walls = vec![
            wall(0, [0.0, 0.0], [3.0, 0.0], 100),
            wall(1, [3.1, 0.02], [6.0, 0.0], 100),
            wall(2, [6.2, 0.04], [10.0, 0.0], 100),
        ];
        let out = regularize(walls, &config);
        for i in 0..out.len() {
            for j in (i + 1)..out.len() {
                assert!(try_merge(&out[i], &out[j], min_cos, &config).is_none());
            }
        }
    }

    #[test]
    fn corner_endpoints_snap_to_intersection() {
        let walls = vec![
            wall(0, [0.0, 0.0], [4.95, 0.0], 100),
            wall(1, [5.0, 0.05], [5.0, 5.0], 100),
        ];
        let out = regularize(walls, &RegularizeConfig::default());
        let gap = (out[0].end_2d() - out[1].start_2d()).norm();
        assert!(gap < 1e-9, "corner gap {gap}");
    }

    #[test]
    fn three_way_corner_collapses_to_centroid() {
        let walls = vec![
            wall(0, [0.0, 0.0], [5.0, 0.0], 100),
            wall(1, [5.05, 0.05], [5.0, 5.0], 100),
            wall(2, [4.95, -0.05], [10.0, 0.0], 100),
        ];
        let mut out = vec![walls[0].clone(), walls[1].clone(), walls[2].clone()];
        snap_intersections(&mut out, &RegularizeConfig::default());
        let c0 = out[0].end_2d();
        let c1 = out[1].start_2d();
        let c2 = out[2].start_2d();
        assert!((c0 - c1).norm() < 1e-9);
        assert!((c1 - c2).norm() < 1e-9);
    }

    #[test]
    fn orthogonalize_squares_a_skewed_corner() {
        let config = RegularizeConfig {
            orthogonalize: true,
            ..RegularizeConfig::default()
        };
        // 88 degrees between the two walls.
        let theta: f64 = 88f64.to_radians();
        let walls = vec![
            wall(0, [0.0, 0.0], [5.0, 0.0], 100),
            wall(1, [0.0, 0.0], [5.0 * theta.cos(), 5.0 * theta.sin()], 100),
        ];
        let mut out = walls;
        orthogonalize(&mut out, &config);
        let angle = out[0].direction().dot(&out[1].direction()).abs().acos();
        approx::assert_relative_eq!(angle, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
    }
}
