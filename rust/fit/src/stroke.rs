// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stroke-guided wall fitting.
//!
//! A stroke is a rough 2D centerline drawn over the plan. For each stroke
//! segment, the fitter pulls the cloud points inside a corridor around the
//! segment, runs a constrained local plane detection over them, projects
//! the winning plane to a 2D line, and snaps the stroke endpoints onto it.
//! Segments that cannot be resolved are reported, never silently dropped.

use nalgebra::{Point2, Point3, Vector2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use planscan_core::io::strokes::StrokeRecord;
use planscan_core::{Error, PointSample, Progress, Result};
use planscan_detect::{detect_planes, project_plane, RansacParams};
use planscan_index::SpatialIndex;

use crate::height::HeightField;
use crate::wall::{WallIdAllocator, WallSegment};

/// Stroke fitting knobs, meters and degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Corridor half-width around the stroke line.
    pub search_radius: f64,
    /// Corridor extension past each segment endpoint.
    pub end_extension: f64,
    /// Neighborhood size below which a segment is unresolved.
    pub min_points_stroke: usize,
    /// Max angle between the fitted normal and the stroke perpendicular.
    pub angle_tolerance_deg: f64,
    /// Clamp for the residual-derived wall thickness.
    pub max_wall_thickness: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            search_radius: 0.3,
            end_extension: 0.2,
            min_points_stroke: 200,
            angle_tolerance_deg: 20.0,
            max_wall_thickness: 0.5,
        }
    }
}

/// Why a stroke segment produced no wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    TooFewPoints,
    NoMatchingPlane,
    HeightMiss,
}

#[derive(Debug, Clone)]
pub struct UnresolvedStroke {
    pub stroke_id: u32,
    /// Segment index within the stroke polyline.
    pub segment: usize,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Default)]
pub struct StrokeFitOutcome {
    pub walls: Vec<WallSegment>,
    pub unresolved: Vec<UnresolvedStroke>,
}

/// Fits every segment of every stroke against the cloud.
#[allow(clippy::too_many_arguments)]
pub fn fit_strokes(
    samples: &[PointSample],
    index: &SpatialIndex,
    strokes: &[StrokeRecord],
    heights: &HeightField,
    base_params: &RansacParams,
    config: &FitConfig,
    ids: &mut WallIdAllocator,
    rng: &mut StdRng,
    progress: &mut Progress<'_>,
) -> Result<StrokeFitOutcome> {
    let mut outcome = StrokeFitOutcome::default();
    let total_segments: usize = strokes.iter().map(StrokeRecord::segment_count).sum();
    let mut done = 0usize;

    for stroke in strokes {
        for (segment, (a, b)) in segment_pairs(stroke).enumerate() {
            match fit_segment(
                samples, index, stroke.id, segment, &a, &b, heights, base_params, config, ids, rng,
            )? {
                SegmentFit::Wall(wall) => outcome.walls.push(wall),
                SegmentFit::Unresolved(u) => {
                    warn!(
                        stroke = u.stroke_id,
                        segment = u.segment,
                        reason = ?u.reason,
                        "stroke segment unresolved"
                    );
                    outcome.unresolved.push(u);
                }
            }
            done += 1;
            if total_segments > 0 {
                progress.report("stroke-fit", (done * 100 / total_segments) as u32)?;
            }
        }
    }
    Ok(outcome)
}

enum SegmentFit {
    Wall(WallSegment),
    Unresolved(UnresolvedStroke),
}

fn segment_pairs(stroke: &StrokeRecord) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
    let n = stroke.points.len();
    let open_pairs = n.saturating_sub(1);
    let count = if stroke.closed && n > 2 { n } else { open_pairs };
    (0..count).map(move |i| {
        let a = stroke.points[i];
        let b = stroke.points[(i + 1) % n];
        (Point2::new(a[0], a[1]), Point2::new(b[0], b[1]))
    })
}

#[allow(clippy::too_many_arguments)]
fn fit_segment(
    samples: &[PointSample],
    index: &SpatialIndex,
    stroke_id: u32,
    segment: usize,
    a: &Point2<f64>,
    b: &Point2<f64>,
    heights: &HeightField,
    base_params: &RansacParams,
    config: &FitConfig,
    ids: &mut WallIdAllocator,
    rng: &mut StdRng,
) -> Result<SegmentFit> {
    let unresolved = |reason| {
        Ok(SegmentFit::Unresolved(UnresolvedStroke {
            stroke_id,
            segment,
            reason,
        }))
    };

    let dir = b - a;
    let len = dir.norm();
    if len < 1e-9 {
        return unresolved(UnresolvedReason::TooFewPoints);
    }
    let dir = dir / len;

    let neighborhood = corridor_indices(samples, index, a, &dir, len, config);
    if neighborhood.len() < config.min_points_stroke {
        return unresolved(UnresolvedReason::TooFewPoints);
    }

    // Local detection over the corridor subset, with relaxed support.
    let local: Vec<PointSample> = neighborhood
        .iter()
        .map(|&i| samples[i as usize].clone())
        .collect();
    let local_params = base_params
        .clone()
        .with_min_points((config.min_points_stroke / 2).max(3));
    let planes = detect_planes(&local, &local_params, rng, &mut Progress::none())?;

    // The fitted wall must face roughly across the stroke.
    let perpendicular = Vector2::new(-dir.y, dir.x);
    let min_cos = config.angle_tolerance_deg.to_radians().cos();
    let chosen = planes.iter().find(|det| {
        let n = det.plane.normal;
        let plan = Vector2::new(n.x, n.y);
        let norm = plan.norm();
        norm > 1e-9 && (plan / norm).dot(&perpendicular).abs() >= min_cos
    });
    let Some(det) = chosen else {
        return unresolved(UnresolvedReason::NoMatchingPlane);
    };

    let line = match project_plane(stroke_id, det, &local) {
        Ok(line) => line,
        Err(Error::GeometryDegenerate(msg)) => {
            debug!(stroke = stroke_id, segment, %msg, "projection degenerate");
            return unresolved(UnresolvedReason::NoMatchingPlane);
        }
        Err(e) => return Err(e),
    };

    // Endpoints come from the stroke, not the inlier extremes.
    let start_2d = line.form.project(a);
    let end_2d = line.form.project(b);
    let midpoint = Point2::from((start_2d.coords + end_2d.coords) * 0.5);
    let pair = match heights.resolve(&midpoint) {
        Ok(pair) => pair,
        Err(Error::ResolverMiss { .. }) => {
            return unresolved(UnresolvedReason::HeightMiss);
        }
        Err(e) => return Err(e),
    };

    // Thickness from the spread of supporting points about the line.
    let mut residuals: Vec<f64> = det
        .inliers
        .iter()
        .map(|&i| {
            let p = &local[i as usize].position;
            line.form.distance(&Point2::new(p.x as f64, p.y as f64))
        })
        .collect();
    residuals.sort_by(f64::total_cmp);
    let p99 = residuals[((residuals.len() - 1) as f64 * 0.99) as usize];
    let thickness = (2.0 * p99).clamp(0.0, config.max_wall_thickness);

    let confidence = det.inliers.len() as f64 / neighborhood.len() as f64;
    let supports: Vec<u32> = det.inliers.iter().map(|&i| neighborhood[i as usize]).collect();

    Ok(SegmentFit::Wall(WallSegment {
        id: ids.next_id(),
        start: Point3::new(start_2d.x, start_2d.y, pair.floor),
        end: Point3::new(end_2d.x, end_2d.y, pair.floor),
        normal: line.normal,
        thickness,
        height: pair.span(),
        supports,
        stroke_ids: vec![stroke_id],
        confidence,
        created_at: std::time::SystemTime::now(),
    }))
}

/// Indices of cloud points inside the segment's corridor: within
/// `search_radius` of the infinite stroke line, with the projection onto
/// the segment inside `[-end_extension, len + end_extension]`.
fn corridor_indices(
    samples: &[PointSample],
    index: &SpatialIndex,
    a: &Point2<f64>,
    dir: &Vector2<f64>,
    len: f64,
    config: &FitConfig,
) -> Vec<u32> {
    let pad = (config.search_radius + config.end_extension) as f32;
    let b = a + dir * len;
    let mut aabb = planscan_core::Aabb::empty();
    aabb.expand(&Point3::new(a.x as f32, a.y as f32, 0.0));
    aabb.expand(&Point3::new(b.x as f32, b.y as f32, 0.0));
    aabb.min.x -= pad;
    aabb.min.y -= pad;
    aabb.max.x += pad;
    aabb.max.y += pad;
    // Corridors span all heights.
    aabb.min.z = f32::MIN;
    aabb.max.z = f32::MAX;

    index
        .aabb_query(&aabb)
        .into_iter()
        .filter(|&i| {
            let p = &samples[i as usize].position;
            let rel = Vector2::new(p.x as f64 - a.x, p.y as f64 - a.y);
            let along = rel.dot(dir);
            let across = (rel - dir * along).norm();
            across <= config.search_radius
                && along >= -config.end_extension
                && along <= len + config.end_extension
        })
        .collect()
}
