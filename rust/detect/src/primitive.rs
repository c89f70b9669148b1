// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed sum type over the detectable primitive kinds.

use crate::cylinder::DetectedCylinder;
use crate::plane::DetectedPlane;

/// One accepted primitive, tagged by kind. No shape inherits from anything;
/// consumers match.
#[derive(Debug, Clone)]
pub enum Primitive {
    VerticalPlane(DetectedPlane),
    HorizontalPlane(DetectedPlane),
    Cylinder(DetectedCylinder),
}

impl Primitive {
    /// Wraps a detected plane under the verticality rule used everywhere
    /// else: |n_z| ≤ cos_angle is a wall, |n_z| > 0.9 is horizontal.
    /// Oblique planes have no primitive kind and return `None`.
    pub fn from_plane(det: DetectedPlane, cos_angle: f64) -> Option<Self> {
        let v = det.plane.verticality();
        if v <= cos_angle {
            Some(Self::VerticalPlane(det))
        } else if v > 0.9 {
            Some(Self::HorizontalPlane(det))
        } else {
            None
        }
    }

    pub fn inlier_count(&self) -> usize {
        match self {
            Self::VerticalPlane(p) | Self::HorizontalPlane(p) => p.inliers.len(),
            Self::Cylinder(c) => c.inliers.len(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::VerticalPlane(_) => "vertical-plane",
            Self::HorizontalPlane(_) => "horizontal-plane",
            Self::Cylinder(_) => "cylinder",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::Plane3;
    use nalgebra::Vector3;

    fn plane(nz: f64) -> DetectedPlane {
        let nx = (1.0 - nz * nz).sqrt();
        DetectedPlane {
            plane: Plane3::new(Vector3::new(nx, 0.0, nz), 0.0),
            inliers: vec![0, 1, 2],
        }
    }

    #[test]
    fn classification_bands() {
        assert!(matches!(
            Primitive::from_plane(plane(0.0), 0.08),
            Some(Primitive::VerticalPlane(_))
        ));
        assert!(matches!(
            Primitive::from_plane(plane(1.0), 0.08),
            Some(Primitive::HorizontalPlane(_))
        ));
        assert!(Primitive::from_plane(plane(0.5), 0.08).is_none());
    }
}
