// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Projection of vertical planes to 2D facade lines, and classification of
//! detected planes into wall, floor, and ceiling point pools.
//!
//! A wall plane `n_x x + n_y y + n_z z + d = 0` with near-zero `n_z`
//! projects to the line `y = k x + b` with `k = -n_x / n_y`; when `n_y`
//! vanishes the line degenerates to `x = const`. Endpoints come from the
//! extreme inliers along the line direction, projected onto the fitted
//! line.

use nalgebra::{Point2, Vector2, Vector3};
use tracing::warn;

use planscan_core::{Error, PointSample, Result};

use crate::plane::DetectedPlane;

/// `|n_y|` below this uses the degenerate `x = const` form.
const VERTICAL_EPS: f64 = 1e-6;
/// Endpoints beyond this coordinate magnitude indicate a broken fit.
const COORD_SANITY: f64 = 1e6;
/// Inlier count a plane needs before it feeds the facade/floor/ceiling pools.
const POOL_MIN_INLIERS: usize = 1000;
/// Min z-extent in meters for a vertical plane to count as a wall.
const WALL_MIN_Z_EXTENT: f64 = 0.8;

/// Supporting line of a 2D facade line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineForm {
    /// `y = k x + b`.
    Slope { k: f64, b: f64 },
    /// `x = x0`.
    Vertical { x: f64 },
}

impl LineForm {
    /// Unit direction along the line, oriented positively.
    pub fn direction(&self) -> Vector2<f64> {
        match *self {
            Self::Slope { k, .. } => Vector2::new(1.0, k).normalize(),
            Self::Vertical { .. } => Vector2::new(0.0, 1.0),
        }
    }

    /// Orthogonal projection of `p` onto the line.
    pub fn project(&self, p: &Point2<f64>) -> Point2<f64> {
        match *self {
            Self::Slope { k: _, b } => {
                let anchor = Point2::new(0.0, b);
                let d = self.direction();
                anchor + d * d.dot(&(p - anchor))
            }
            Self::Vertical { x } => Point2::new(x, p.y),
        }
    }

    /// Orthogonal distance from `p` to the line.
    pub fn distance(&self, p: &Point2<f64>) -> f64 {
        (p - self.project(p)).norm()
    }
}

/// A vertical plane flattened to its floor plan trace.
#[derive(Debug, Clone)]
pub struct Line2 {
    /// Sequential id in detection order.
    pub id: u32,
    pub form: LineForm,
    /// Endpoint at the minimal axis parameter.
    pub s: Point2<f64>,
    /// Endpoint at the maximal axis parameter.
    pub t: Point2<f64>,
    /// Mean inlier normal in the plan, unit length.
    pub normal: Vector2<f64>,
    pub z_min: f64,
    pub z_max: f64,
    /// Mean |plane distance| over inliers.
    pub mean_residual: f64,
    /// Indices into the sample slice the detector ran over.
    pub inliers: Vec<u32>,
}

impl Line2 {
    pub fn length(&self) -> f64 {
        (self.t - self.s).norm()
    }

    pub fn z_extent(&self) -> f64 {
        self.z_max - self.z_min
    }
}

/// Projects a detected vertical (or horizontal, for bookkeeping) plane onto
/// the floor plan.
pub fn project_plane(id: u32, det: &DetectedPlane, samples: &[PointSample]) -> Result<Line2> {
    if det.inliers.is_empty() {
        return Err(Error::GeometryDegenerate("plane with no inliers".into()));
    }
    let n = det.plane.normal;
    let degenerate = n.y.abs() < VERTICAL_EPS;
    let k = if degenerate { 0.0 } else { -n.x / n.y };

    // Perpendicular of the plan-projected normal, oriented to match
    // `LineForm::direction()` regardless of the normal's sign.
    let dir = Vector2::new(-n.y, n.x);
    let mut dir = if dir.norm_squared() < VERTICAL_EPS * VERTICAL_EPS {
        return Err(Error::GeometryDegenerate(
            "plane normal has no plan component".into(),
        ));
    } else {
        dir.normalize()
    };
    if dir.x < 0.0 || (dir.x == 0.0 && dir.y < 0.0) {
        dir = -dir;
    }

    let mut b_sum = 0.0;
    let mut x_sum = 0.0;
    let mut residual_sum = 0.0;
    let mut normal_sum = Vector2::zeros();
    let mut z_min = f64::INFINITY;
    let mut z_max = f64::NEG_INFINITY;
    let mut u_min = f64::INFINITY;
    let mut u_max = f64::NEG_INFINITY;
    let mut p_min = Point2::origin();
    let mut p_max = Point2::origin();

    for &i in &det.inliers {
        let sample = &samples[i as usize];
        let p3 = sample.position.cast::<f64>();
        let p = Point2::new(p3.x, p3.y);
        let u = dir.dot(&p.coords);
        // Axis-parameter extremes; ties break y-ascending at the low end
        // and y-descending at the high end.
        if u < u_min || (u == u_min && p.y < p_min.y) {
            u_min = u;
            p_min = p;
        }
        if u > u_max || (u == u_max && p.y > p_max.y) {
            u_max = u;
            p_max = p;
        }
        z_min = z_min.min(p3.z);
        z_max = z_max.max(p3.z);
        b_sum += p.y - k * p.x;
        x_sum += p.x;
        residual_sum += det.plane.distance(&p3);
        let sn = sample.normal_or_zero().cast::<f64>();
        normal_sum += Vector2::new(sn.x, sn.y);
    }

    let count = det.inliers.len() as f64;
    let form = if degenerate {
        LineForm::Vertical { x: x_sum / count }
    } else {
        LineForm::Slope { k, b: b_sum / count }
    };
    let s = form.project(&p_min);
    let t = form.project(&p_max);
    if s.x.abs() > COORD_SANITY
        || s.y.abs() > COORD_SANITY
        || t.x.abs() > COORD_SANITY
        || t.y.abs() > COORD_SANITY
    {
        return Err(Error::GeometryDegenerate(format!(
            "line endpoints out of range: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            s.x, s.y, t.x, t.y
        )));
    }
    let normal = if normal_sum.norm_squared() < VERTICAL_EPS * VERTICAL_EPS {
        // Fall back to the plane's own plan normal.
        Vector2::new(n.x, n.y).normalize()
    } else {
        normal_sum.normalize()
    };

    Ok(Line2 {
        id,
        form,
        s,
        t,
        normal,
        z_min,
        z_max,
        mean_residual: residual_sum / count,
        inliers: det.inliers.clone(),
    })
}

/// Wall lines plus the synthetic-normal point pools feeding surface
/// reconstruction.
#[derive(Debug, Default)]
pub struct Classification {
    /// Facade lines from vertical planes, detection order.
    pub wall_lines: Vec<Line2>,
    /// Points of retained walls, normals forced to (0, 1, 0).
    pub wall_points: Vec<PointSample>,
    /// Floor plane points, normals forced to (0, 0, 1).
    pub floor_points: Vec<PointSample>,
    /// Ceiling plane points, normals forced to (0, 0, -1).
    pub ceiling_points: Vec<PointSample>,
}

/// Sorts detected planes into walls, floor, and ceiling.
///
/// `next_id` numbers projected lines across label groups. `z_range` and
/// `whole_mean_z` come from the whole label group, not the plane.
pub fn classify_planes(
    planes: &[DetectedPlane],
    samples: &[PointSample],
    cos_angle: f64,
    z_min: f64,
    z_max: f64,
    whole_mean_z: f64,
    next_id: &mut u32,
) -> Classification {
    let mut out = Classification::default();
    let mut horizontal = Vec::new();

    for det in planes {
        let verticality = det.plane.verticality();
        if verticality <= cos_angle {
            match project_plane(*next_id, det, samples) {
                Ok(line) => {
                    *next_id += 1;
                    out.wall_lines.push(line);
                }
                Err(e) => warn!(error = %e, "skipping unprojectable wall plane"),
            }
        } else if verticality > 0.9 {
            *next_id += 1;
            horizontal.push(det);
        }
        // Oblique planes are furniture or clutter; dropped.
    }

    // Only substantial, tall walls feed the facade point pool.
    for line in &out.wall_lines {
        if line.inliers.len() > POOL_MIN_INLIERS && line.z_extent() > WALL_MIN_Z_EXTENT {
            for &i in &line.inliers {
                out.wall_points.push(PointSample {
                    position: samples[i as usize].position,
                    normal: Some(Vector3::new(0.0, 1.0, 0.0)),
                    label: samples[i as usize].label,
                });
            }
        }
    }

    // Split horizontal planes around the group's mean height band.
    let band = 0.3 * (z_max - z_min);
    for det in horizontal {
        if det.inliers.len() <= POOL_MIN_INLIERS {
            continue;
        }
        let mean_z: f64 = det
            .inliers
            .iter()
            .map(|&i| samples[i as usize].position.z as f64)
            .sum::<f64>()
            / det.inliers.len() as f64;
        if mean_z > whole_mean_z + band {
            for &i in &det.inliers {
                out.ceiling_points.push(PointSample {
                    position: samples[i as usize].position,
                    normal: Some(Vector3::new(0.0, 0.0, -1.0)),
                    label: samples[i as usize].label,
                });
            }
        } else if mean_z < whole_mean_z - band {
            for &i in &det.inliers {
                out.floor_points.push(PointSample {
                    position: samples[i as usize].position,
                    normal: Some(Vector3::new(0.0, 0.0, 1.0)),
                    label: samples[i as usize].label,
                });
            }
        }
        // Mid-height horizontal planes are tables and shelves; dropped.
    }

    out
}
