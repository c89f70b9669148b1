// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cylinder primitives from oriented point pairs.
//!
//! A cylinder candidate comes from two samples: the axis direction is the
//! cross product of their normals, and the axis position is where the two
//! surface normals (projected into the plane perpendicular to the axis)
//! meet. Near-vertical cylinders reduce to a circle at mid height for the
//! footprint stage.

use nalgebra::{Point2, Point3, Vector3};

use planscan_core::{Error, PointSample, Result};

const DEGENERATE_SQ: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct Cylinder3 {
    /// Any point on the axis.
    pub axis_point: Point3<f64>,
    /// Unit axis direction.
    pub axis_dir: Vector3<f64>,
    pub radius: f64,
}

impl Cylinder3 {
    /// Fits a candidate from two oriented samples.
    pub fn from_pair(
        p1: &Point3<f64>,
        n1: &Vector3<f64>,
        p2: &Point3<f64>,
        n2: &Vector3<f64>,
    ) -> Result<Self> {
        let axis = n1.cross(n2);
        if axis.norm_squared() < DEGENERATE_SQ {
            return Err(Error::GeometryDegenerate(
                "parallel normals give no cylinder axis".into(),
            ));
        }
        let a = axis.normalize();
        // Work in the plane perpendicular to the axis.
        let q1 = p1.coords - a * p1.coords.dot(&a);
        let q2 = p2.coords - a * p2.coords.dot(&a);
        let m1 = n1 - a * n1.dot(&a);
        let m2 = n2 - a * n2.dot(&a);
        let denom = m1.cross(&m2).dot(&a);
        if denom.abs() < 1e-9 {
            return Err(Error::GeometryDegenerate(
                "projected normals do not intersect".into(),
            ));
        }
        // Lines q1 + t*m1 and q2 + s*m2 meet on the axis.
        let t = (q2 - q1).cross(&m2).dot(&a) / denom;
        let center = q1 + m1 * t;
        let radius = ((q1 - center).norm() + (q2 - center).norm()) * 0.5;
        if !radius.is_finite() || radius < 1e-6 {
            return Err(Error::GeometryDegenerate("degenerate cylinder radius".into()));
        }
        Ok(Self {
            axis_point: Point3::from(center),
            axis_dir: a,
            radius,
        })
    }

    /// Distance from `p` to the cylinder surface.
    #[inline]
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        (self.radial_offset(p).norm() - self.radius).abs()
    }

    /// |cos| between `n` and the outward radial direction at `p`.
    pub fn normal_agreement(&self, p: &Point3<f64>, n: &Vector3<f64>) -> f64 {
        let radial = self.radial_offset(p);
        let len = radial.norm();
        if len < 1e-9 {
            return 0.0;
        }
        (radial / len).dot(n).abs()
    }

    /// Normalized |z| of the axis direction; 1 for a perfectly vertical axis.
    #[inline]
    pub fn axis_verticality(&self) -> f64 {
        self.axis_dir.z.abs()
    }

    #[inline]
    fn radial_offset(&self, p: &Point3<f64>) -> Vector3<f64> {
        let rel = p - self.axis_point;
        rel - self.axis_dir * rel.dot(&self.axis_dir)
    }
}

/// An accepted cylinder with its supporting point indices.
#[derive(Debug, Clone)]
pub struct DetectedCylinder {
    pub cylinder: Cylinder3,
    pub inliers: Vec<u32>,
}

/// 2D cylinder footprint.
#[derive(Debug, Clone, Copy)]
pub struct Circle2 {
    pub center: Point2<f64>,
    pub radius: f64,
    pub inlier_count: usize,
    pub active: bool,
}

impl DetectedCylinder {
    /// Footprint circle where the axis crosses the mean inlier height.
    ///
    /// Fails for axes too far from vertical to cross a horizontal plane
    /// within the scan.
    pub fn footprint(&self, samples: &[PointSample]) -> Result<Circle2> {
        let axis = &self.cylinder.axis_dir;
        if axis.z.abs() < 1e-9 {
            return Err(Error::GeometryDegenerate(
                "horizontal axis has no footprint circle".into(),
            ));
        }
        let mut mid = 0.0;
        for &i in &self.inliers {
            mid += samples[i as usize].position.z as f64;
        }
        mid /= self.inliers.len() as f64;
        let t = (mid - self.cylinder.axis_point.z) / axis.z;
        let c = self.cylinder.axis_point + axis * t;
        Ok(Circle2 {
            center: Point2::new(c.x, c.y),
            radius: self.cylinder.radius,
            inlier_count: self.inliers.len(),
            active: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_fit_recovers_vertical_cylinder() {
        // Radius 0.5 around the axis through (5, 5).
        let p1 = Point3::new(5.5, 5.0, 0.2);
        let n1 = Vector3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(5.0, 5.5, 1.7);
        let n2 = Vector3::new(0.0, 1.0, 0.0);
        let cyl = Cylinder3::from_pair(&p1, &n1, &p2, &n2).unwrap();
        approx::assert_relative_eq!(cyl.radius, 0.5, epsilon = 1e-9);
        approx::assert_relative_eq!(cyl.axis_verticality(), 1.0, epsilon = 1e-9);
        approx::assert_relative_eq!(cyl.distance(&Point3::new(4.5, 5.0, 2.0)), 0.0, epsilon = 1e-9);
        approx::assert_relative_eq!(cyl.distance(&Point3::new(5.0, 5.0, 0.0)), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn parallel_normals_are_degenerate() {
        let n = Vector3::x();
        let r = Cylinder3::from_pair(
            &Point3::new(0.0, 0.0, 0.0),
            &n,
            &Point3::new(0.0, 1.0, 0.0),
            &n,
        );
        assert!(matches!(r, Err(Error::GeometryDegenerate(_))));
    }

    #[test]
    fn normal_agreement_is_radial() {
        let cyl = Cylinder3 {
            axis_point: Point3::origin(),
            axis_dir: Vector3::z(),
            radius: 1.0,
        };
        let p = Point3::new(1.0, 0.0, 0.5);
        approx::assert_relative_eq!(cyl.normal_agreement(&p, &Vector3::x()), 1.0);
        approx::assert_relative_eq!(cyl.normal_agreement(&p, &Vector3::y()), 0.0);
    }
}
