// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline controller: label groups in, walls and wireframe out.
//!
//! Stages run strictly downstream: per-group plane detection and
//! classification, cylinder detection over the residual pool, footprint
//! cleaning, stroke-guided wall fitting, regularization, and wireframe
//! extrusion. One seeded RNG is threaded through every stage in a fixed
//! order, so two runs with the same seed produce identical output.

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use planscan_core::io::lineset::FloorPlanLine;
use planscan_core::io::strokes::StrokeRecord;
use planscan_core::{PointCloud, PointSample, PolyMesh, Progress, Result};
use planscan_detect::{
    classify_planes, clean_circles, detect_cylinders, detect_planes, Circle2, Line2, Primitive,
    RansacParams,
};
use planscan_index::SpatialIndex;

use crate::height::{flat_height_field, HeightField};
use crate::regularize::{regularize, RegularizeConfig};
use crate::stroke::{fit_strokes, FitConfig, StrokeFitOutcome};
use crate::wall::{WallIdAllocator, WallSegment};
use crate::wireframe::{extrude_cylinders, extrude_walls, PrismEdge};

/// Everything the pipeline needs to run, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ransac: RansacParams,
    pub fit: FitConfig,
    pub regularize: RegularizeConfig,
    /// Seed for every random draw in the run.
    pub seed: u64,
    /// Min clustered inliers for a cylinder; looser than wall planes.
    pub cylinder_min_points: usize,
    /// Footprints above this radius are structural, not columns.
    pub max_cylinder_radius: f64,
    pub detect_cylinders: bool,
    pub regularize_walls: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ransac: RansacParams::default(),
            fit: FitConfig::default(),
            regularize: RegularizeConfig::default(),
            seed: 0,
            cylinder_min_points: 1000,
            max_cylinder_radius: 1.0,
            detect_cylinders: true,
            regularize_walls: true,
        }
    }
}

/// Final per-run counters, printed by the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub planes: usize,
    pub walls: usize,
    pub cylinders: usize,
    pub unresolved_strokes: usize,
}

#[derive(Debug)]
pub struct PipelineOutput {
    /// Everything detection accepted, tagged by kind, in detection order.
    pub primitives: Vec<Primitive>,
    /// Facade projection lines, detection order.
    pub wall_lines: Vec<Line2>,
    /// Retained wall points, synthetic (0,1,0) normals.
    pub wall_points: Vec<PointSample>,
    pub floor_points: Vec<PointSample>,
    pub ceiling_points: Vec<PointSample>,
    /// Cleaned cylinder footprints (inactive ones retained for the record).
    pub circles: Vec<Circle2>,
    /// Fitted and regularized wall segments.
    pub walls: Vec<WallSegment>,
    pub unresolved: Vec<crate::stroke::UnresolvedStroke>,
    /// Extruded wall quads.
    pub wall_mesh: PolyMesh,
    /// Octagonal cylinder prisms.
    pub cylinder_mesh: PolyMesh,
    pub cylinder_edges: Vec<PrismEdge>,
    pub summary: Summary,
}

impl PipelineOutput {
    /// Floor plan line set rows for the text output.
    pub fn floor_plan_lines(&self) -> Vec<FloorPlanLine> {
        self.wall_lines
            .iter()
            .map(|l| FloorPlanLine {
                x1: l.s.x,
                y1: l.s.y,
                x2: l.t.x,
                y2: l.t.y,
                nx: l.normal.x,
                ny: l.normal.y,
            })
            .collect()
    }

    /// Active footprints as `(cx, cy, r)` rows.
    pub fn circle_rows(&self) -> Vec<(f64, f64, f64)> {
        self.circles
            .iter()
            .filter(|c| c.active)
            .map(|c| (c.center.x, c.center.y, c.radius))
            .collect()
    }
}

/// Runs the full reconstruction over `cloud`.
///
/// `heights` carries reconstructed floor/ceiling meshes when available;
/// without them a flat field spanning the cloud bounds is used, with floor
/// and ceiling levels taken from the detected horizontal planes (falling
/// back to the cloud's z range).
pub fn run(
    cloud: &PointCloud,
    strokes: &[StrokeRecord],
    heights: Option<HeightField>,
    config: &PipelineConfig,
    progress: &mut Progress<'_>,
) -> Result<PipelineOutput> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let samples = cloud.samples();
    let stats = cloud.z_stats();

    // Stage 1: per-group plane detection and classification.
    let mut wall_lines = Vec::new();
    let mut wall_points = Vec::new();
    let mut floor_points = Vec::new();
    let mut ceiling_points = Vec::new();
    let mut planes_total = 0usize;
    let mut next_line_id = 0u32;
    let mut claimed = vec![false; samples.len()];
    let mut primitives = Vec::new();

    let groups = cloud.groups();
    for (gi, group) in groups.iter().enumerate() {
        let group_samples = cloud.group_samples(group);
        let planes = detect_planes(group_samples, &config.ransac, &mut rng, &mut Progress::none())?;
        planes_total += planes.len();
        for det in &planes {
            for &i in &det.inliers {
                claimed[group.range.start + i as usize] = true;
            }
            match Primitive::from_plane(det.clone(), config.ransac.cos_angle) {
                Some(p) => {
                    info!(
                        label = group.label,
                        kind = p.kind_name(),
                        inliers = p.inlier_count(),
                        "primitive accepted"
                    );
                    primitives.push(p);
                }
                None => warn!(label = group.label, "oblique plane has no primitive kind"),
            }
        }
        let mut classification = classify_planes(
            &planes,
            group_samples,
            config.ransac.cos_angle,
            stats.min_z,
            stats.max_z,
            stats.mean_z,
            &mut next_line_id,
        );
        // Lift inlier indices from group-relative to cloud order.
        for line in &mut classification.wall_lines {
            for i in &mut line.inliers {
                *i += group.range.start as u32;
            }
        }
        wall_lines.extend(classification.wall_lines);
        wall_points.extend(classification.wall_points);
        floor_points.extend(classification.floor_points);
        ceiling_points.extend(classification.ceiling_points);
        progress.report("detect", ((gi + 1) * 100 / groups.len()) as u32)?;
    }
    info!(
        planes = planes_total,
        lines = wall_lines.len(),
        "plane detection finished"
    );

    // Stage 2: cylinders over everything no plane claimed.
    let mut circles: Vec<Circle2> = Vec::new();
    if config.detect_cylinders {
        let residual: Vec<PointSample> = samples
            .iter()
            .zip(&claimed)
            .filter(|(_, &c)| !c)
            .map(|(s, _)| *s)
            .collect();
        if residual.len() >= config.cylinder_min_points {
            let params = config
                .ransac
                .clone()
                .with_min_points(config.cylinder_min_points);
            let cylinders = detect_cylinders(&residual, &params, &mut rng, progress)?;
            for det in &cylinders {
                // Only near-plumb axes count as column footprints.
                if det.cylinder.axis_verticality() < 1.0 - config.ransac.cos_angle {
                    continue;
                }
                match det.footprint(&residual) {
                    Ok(circle) => {
                        circles.push(circle);
                        primitives.push(Primitive::Cylinder(det.clone()));
                    }
                    Err(e) => warn!(error = %e, "skipping cylinder without footprint"),
                }
            }
            clean_circles(&mut circles, config.max_cylinder_radius);
        }
    }
    let active_cylinders = circles.iter().filter(|c| c.active).count();
    info!(cylinders = active_cylinders, "cylinder detection finished");

    // Stage 3: height field.
    let field = match heights {
        Some(f) => f,
        None => {
            let bounds = cloud.bounds();
            let floor_z = mean_z(&floor_points).unwrap_or(stats.min_z);
            let ceiling_z = mean_z(&ceiling_points).unwrap_or(stats.max_z);
            flat_height_field(
                Point2::new(bounds.min.x as f64 - 2.0, bounds.min.y as f64 - 2.0),
                Point2::new(bounds.max.x as f64 + 2.0, bounds.max.y as f64 + 2.0),
                floor_z,
                ceiling_z,
            )
        }
    };

    // Stage 4: stroke-guided wall fitting.
    let mut ids = WallIdAllocator::new();
    let outcome = if strokes.is_empty() {
        StrokeFitOutcome::default()
    } else {
        let positions: Vec<_> = samples.iter().map(|s| s.position).collect();
        let index = SpatialIndex::build_kdtree(&positions)
            .map_err(|e| planscan_core::Error::InvalidInput(e.to_string()))?;
        fit_strokes(
            samples,
            &index,
            strokes,
            &field,
            &config.ransac,
            &config.fit,
            &mut ids,
            &mut rng,
            progress,
        )?
    };
    info!(
        walls = outcome.walls.len(),
        unresolved = outcome.unresolved.len(),
        "stroke fitting finished"
    );

    // Stage 5: regularization.
    let walls = if config.regularize_walls {
        let walls = regularize(outcome.walls, &config.regularize);
        progress.report("regularize", 100)?;
        walls
    } else {
        outcome.walls
    };

    // Stage 6: wireframe extrusion.
    let wall_mesh = extrude_walls(&walls);
    let (cylinder_mesh, cylinder_edges) = extrude_cylinders(&circles, &field)?;
    progress.report("extrude", 100)?;

    let summary = Summary {
        planes: planes_total,
        walls: walls.len(),
        cylinders: circles.iter().filter(|c| c.active).count(),
        unresolved_strokes: outcome.unresolved.len(),
    };
    info!(?summary, "pipeline finished");

    Ok(PipelineOutput {
        primitives,
        wall_lines,
        wall_points,
        floor_points,
        ceiling_points,
        circles,
        walls,
        unresolved: outcome.unresolved,
        wall_mesh,
        cylinder_mesh,
        cylinder_edges,
        summary,
    })
}

fn mean_z(points: &[PointSample]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.position.z as f64).sum::<f64>() / points.len() as f64)
}
