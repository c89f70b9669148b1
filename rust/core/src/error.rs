// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy shared by the whole pipeline.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline-wide error taxonomy.
///
/// Detection-round failures and resolver misses are recoverable and are
/// normally handled locally; everything else bubbles to the pipeline
/// controller, which logs the cause and either continues or aborts.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed text, NaN coordinates, or an empty cloud; surfaced at load.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A full detection pass produced nothing meeting the thresholds.
    #[error("detection failure: {0}")]
    DetectionFailure(String),

    /// Coplanar sample triplet, zero-norm normal, or near-parallel lines
    /// during a snap; the offending local step is skipped.
    #[error("degenerate geometry: {0}")]
    GeometryDegenerate(String),

    /// The height resolver found no containing face for a 2D query point.
    #[error("height resolver miss at ({x:.3}, {y:.3})")]
    ResolverMiss { x: f64, y: f64 },

    /// Memory cap or iteration cap hit; partial results may be available.
    #[error("resource limit: {0}")]
    ResourceLimit(String),

    /// Disk read/write failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Cancellation requested through the progress callback.
    #[error("cancelled")]
    Cancelled,
}
