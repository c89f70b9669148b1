// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for index construction and queries.

use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or mutating a spatial index.
#[derive(Debug, Error)]
pub enum Error {
    /// Building an index over zero points is a caller bug.
    #[error("cannot build a spatial index over an empty cloud")]
    EmptyCloud,

    /// The selected index variant does not support the operation;
    /// callers rebuild instead.
    #[error("{0} is not supported by this index variant; rebuild the index")]
    Unsupported(&'static str),
}
