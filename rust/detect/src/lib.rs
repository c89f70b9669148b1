// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # planscan-detect
//!
//! Seeded RANSAC detection of planes and cylinders in labeled indoor
//! scans, plus the downstream 2D steps: projecting vertical planes to
//! floor plan lines, classifying planes into wall/floor/ceiling pools,
//! and de-overlapping cylinder footprints.
//!
//! All randomness flows through a caller-owned [`rand::rngs::StdRng`];
//! runs with the same seed emit bit-identical primitives.

pub mod clean;
pub mod cylinder;
pub mod params;
pub mod plane;
pub mod primitive;
pub mod project;
pub mod ransac;

pub use clean::clean_circles;
pub use cylinder::{Circle2, Cylinder3, DetectedCylinder};
pub use params::RansacParams;
pub use plane::{DetectedPlane, Plane3};
pub use primitive::Primitive;
pub use project::{classify_planes, project_plane, Classification, Line2, LineForm};
pub use ransac::{detect_cylinders, detect_planes, DETECTION_ROUNDS};
