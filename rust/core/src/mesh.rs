// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2.5D polygon mesh, used for the independently reconstructed floor and
//! ceiling surfaces and for the extruded cylinder prisms.

use nalgebra::Point3;
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// A face is an index polygon (triangle or convex), 0-based.
pub type Face = SmallVec<[u32; 4]>;

/// Vertices in R³ with polygonal faces.
#[derive(Debug, Clone, Default)]
pub struct PolyMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<Face>,
}

impl PolyMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Adds a vertex, returning its index.
    pub fn add_vertex(&mut self, v: Point3<f64>) -> u32 {
        self.vertices.push(v);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_face<I: IntoIterator<Item = u32>>(&mut self, indices: I) {
        self.faces.push(indices.into_iter().collect());
    }

    /// Vertices of one face.
    pub fn face_vertices<'a>(&'a self, face: &'a Face) -> impl Iterator<Item = &'a Point3<f64>> {
        face.iter().map(move |&i| &self.vertices[i as usize])
    }

    /// Checks that every face has at least three vertices and only
    /// in-range indices.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len() as u32;
        for (fi, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(Error::InvalidInput(format!(
                    "face {fi} has {} vertices",
                    face.len()
                )));
            }
            if let Some(&bad) = face.iter().find(|&&i| i >= n) {
                return Err(Error::InvalidInput(format!(
                    "face {fi} references vertex {bad} of {n}"
                )));
            }
        }
        Ok(())
    }
}
