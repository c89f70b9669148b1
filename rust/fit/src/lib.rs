// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall fitting and wireframe output.
//!
//! Consumes detection results from `planscan-detect` and turns them into
//! wall segments and extruded meshes: stroke-guided fitting, segment
//! regularization, floor/ceiling height resolution, and the pipeline
//! controller that strings the stages together.

pub mod height;
pub mod pipeline;
pub mod regularize;
pub mod stroke;
pub mod wall;
pub mod wireframe;

pub use height::{flat_height_field, load_height_field, HeightField, HeightPair};
pub use pipeline::{run, PipelineConfig, PipelineOutput, Summary};
pub use regularize::{regularize, RegularizeConfig};
pub use stroke::{fit_strokes, FitConfig, StrokeFitOutcome, UnresolvedReason, UnresolvedStroke};
pub use wall::{WallIdAllocator, WallSegment};
pub use wireframe::{extrude_cylinders, extrude_walls, PrismEdge};
