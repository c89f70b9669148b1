// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Infinite plane primitives fitted from oriented samples.

use nalgebra::{Matrix3, Point3, Vector3};

use planscan_core::{Error, Result};

/// Cross products below this squared norm mean a degenerate sample triplet.
const DEGENERATE_SQ: f64 = 1e-12;

/// Plane in Hessian normal form: `normal · p + offset = 0`, unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3 {
    pub normal: Vector3<f64>,
    pub offset: f64,
}

impl Plane3 {
    pub fn new(normal: Vector3<f64>, offset: f64) -> Self {
        Self { normal, offset }
    }

    /// Fits a plane through three samples, oriented so the normal agrees
    /// with the majority of the sample normals.
    pub fn from_triplet(
        points: [&Point3<f64>; 3],
        normals: [&Vector3<f64>; 3],
    ) -> Result<Self> {
        let e1 = points[1] - points[0];
        let e2 = points[2] - points[0];
        let cross = e1.cross(&e2);
        if cross.norm_squared() < DEGENERATE_SQ {
            return Err(Error::GeometryDegenerate(
                "collinear sample triplet".into(),
            ));
        }
        let mut normal = cross.normalize();
        let agreement: f64 = normals.iter().map(|n| normal.dot(n)).sum();
        if agreement < 0.0 {
            normal = -normal;
        }
        let offset = -normal.dot(&points[0].coords);
        Ok(Self { normal, offset })
    }

    /// Least-squares refit over `points`, orientation preserved from `self`.
    ///
    /// Centroid plus the smallest-eigenvalue direction of the covariance.
    pub fn refit(&self, points: impl Iterator<Item = Point3<f64>> + Clone) -> Result<Self> {
        let mut centroid = Vector3::zeros();
        let mut count = 0usize;
        for p in points.clone() {
            centroid += p.coords;
            count += 1;
        }
        if count < 3 {
            return Err(Error::GeometryDegenerate(
                "refit needs at least three points".into(),
            ));
        }
        centroid /= count as f64;
        let mut cov = Matrix3::zeros();
        for p in points {
            let d = p.coords - centroid;
            cov += d * d.transpose();
        }
        let eigen = cov.symmetric_eigen();
        let mut min_idx = 0;
        for i in 1..3 {
            if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
                min_idx = i;
            }
        }
        let mut normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into();
        if normal.norm_squared() < DEGENERATE_SQ {
            return Err(Error::GeometryDegenerate("zero-norm refit normal".into()));
        }
        normal.normalize_mut();
        if normal.dot(&self.normal) < 0.0 {
            normal = -normal;
        }
        Ok(Self {
            normal,
            offset: -normal.dot(&centroid),
        })
    }

    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) + self.offset
    }

    #[inline]
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        self.signed_distance(p).abs()
    }

    /// |n_z| after normalization; 0 for a perfectly vertical plane.
    #[inline]
    pub fn verticality(&self) -> f64 {
        self.normal.z.abs()
    }

    pub fn is_vertical(&self, cos_angle: f64) -> bool {
        self.verticality() <= cos_angle
    }

    pub fn is_horizontal(&self) -> bool {
        self.verticality() > 0.9
    }
}

/// An accepted plane with the indices of its supporting points.
#[derive(Debug, Clone)]
pub struct DetectedPlane {
    pub plane: Plane3,
    /// Indices into the sample slice the detector ran over.
    pub inliers: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplet_fit_recovers_plane() {
        let up = Vector3::z();
        let plane = Plane3::from_triplet(
            [
                &Point3::new(0.0, 0.0, 2.0),
                &Point3::new(1.0, 0.0, 2.0),
                &Point3::new(0.0, 1.0, 2.0),
            ],
            [&up, &up, &up],
        )
        .unwrap();
        approx::assert_relative_eq!(plane.normal.z, 1.0, epsilon = 1e-12);
        approx::assert_relative_eq!(plane.offset, -2.0, epsilon = 1e-12);
        approx::assert_relative_eq!(plane.distance(&Point3::new(5.0, -3.0, 2.5)), 0.5);
    }

    #[test]
    fn triplet_orientation_follows_sample_normals() {
        let down = -Vector3::z();
        let plane = Plane3::from_triplet(
            [
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(1.0, 0.0, 0.0),
                &Point3::new(0.0, 1.0, 0.0),
            ],
            [&down, &down, &down],
        )
        .unwrap();
        assert!(plane.normal.z < 0.0);
    }

    #[test]
    fn collinear_triplet_is_degenerate() {
        let n = Vector3::z();
        let result = Plane3::from_triplet(
            [
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(1.0, 0.0, 0.0),
                &Point3::new(2.0, 0.0, 0.0),
            ],
            [&n, &n, &n],
        );
        assert!(matches!(result, Err(Error::GeometryDegenerate(_))));
    }

    #[test]
    fn refit_tightens_noisy_plane() {
        let seed = Plane3::new(Vector3::z(), 0.0);
        let points = (0..100).map(|i| {
            let x = (i % 10) as f64 * 0.1;
            let y = (i / 10) as f64 * 0.1;
            // Deterministic jitter well under the fit tolerance.
            Point3::new(x, y, ((i * 7) % 5) as f64 * 1e-4)
        });
        let refit = seed.refit(points).unwrap();
        assert!(refit.verticality() > 0.999);
    }

    #[test]
    fn verticality_predicates() {
        let wall = Plane3::new(Vector3::x(), 0.0);
        assert!(wall.is_vertical(0.08));
        assert!(!wall.is_horizontal());
        let floor = Plane3::new(Vector3::z(), 0.0);
        assert!(floor.is_horizontal());
        assert!(!floor.is_vertical(0.08));
    }
}
