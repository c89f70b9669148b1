// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # planscan-core
//!
//! Labeled point cloud storage and byte-level file contracts for the
//! planscan reconstruction pipeline.
//!
//! This crate provides:
//!
//! - **Cloud store**: [`PointCloud`] owns the labeled sample array and the
//!   contiguous [`LabelGroup`] ranges derived at load time
//! - **Text cloud parsing**: `x y z label nx ny nz` lines, parsed with
//!   [memchr](https://docs.rs/memchr) line scanning and
//!   [fast-float](https://docs.rs/fast-float)
//! - **Sidecar formats**: binary little-endian PLY point export, ASCII
//!   OFF/COFF meshes, the stroke JSON sidecar, and the plain-text floor
//!   plan / cylinder outputs
//! - **Progress & cancellation**: the cooperative [`Progress`] callback
//!   fired at every pipeline suspension point
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use planscan_core::{io::txt, PointCloud};
//!
//! let cloud: PointCloud = txt::read_cloud_path("scan.txt")?;
//! for group in cloud.groups() {
//!     println!("label {}: {} points", group.label, group.len());
//! }
//! ```

pub mod cloud;
pub mod error;
pub mod io;
pub mod mesh;
pub mod progress;
pub mod types;

pub use cloud::{LabelGroup, PointCloud};
pub use error::{Error, Result};
pub use mesh::PolyMesh;
pub use progress::{Flow, Progress, ProgressEvent};
pub use types::{Aabb, PointSample, Rgba8};
