// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON sidecar for user-drawn wall centerline strokes.
//!
//! Top-level object with a `lines` array; each record carries an id, a
//! polyline of `[x, y]` world coordinates, and a closed flag.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One user stroke: a 2D polyline approximating a wall centerline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrokeRecord {
    pub id: u32,
    pub points: Vec<[f64; 2]>,
    pub closed: bool,
}

impl StrokeRecord {
    /// Number of line segments the polyline expands to.
    pub fn segment_count(&self) -> usize {
        if self.points.len() < 2 {
            0
        } else if self.closed {
            self.points.len()
        } else {
            self.points.len() - 1
        }
    }
}

/// The sidecar file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StrokeFile {
    pub lines: Vec<StrokeRecord>,
}

/// Parses the stroke sidecar from JSON text.
pub fn read_strokes(json: &str) -> Result<StrokeFile> {
    serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("stroke sidecar: {e}")))
}

/// Reads the stroke sidecar from disk.
pub fn read_strokes_path<P: AsRef<Path>>(path: P) -> Result<StrokeFile> {
    let text = fs::read_to_string(path)?;
    read_strokes(&text)
}

/// Serializes the stroke sidecar.
pub fn write_strokes(file: &StrokeFile) -> Result<String> {
    serde_json::to_string_pretty(file).map_err(|e| Error::InvalidInput(format!("stroke sidecar: {e}")))
}
