// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ASCII OFF / COFF mesh reader and writer.
//!
//! First line `OFF` or `COFF`; second line `V F E` (E ignored); then V
//! vertex lines of three floats and F face lines of a leading count plus
//! that many 0-based vertex indices.

use std::fs;
use std::io::Write;
use std::path::Path;

use nalgebra::Point3;

use crate::error::{Error, Result};
use crate::mesh::PolyMesh;

/// Parses an OFF/COFF mesh from text.
pub fn read_off(text: &str) -> Result<PolyMesh> {
    let mut tokens = text.split_ascii_whitespace();

    let magic = tokens
        .next()
        .ok_or_else(|| Error::InvalidInput("empty OFF file".into()))?;
    if magic != "OFF" && magic != "COFF" {
        return Err(Error::InvalidInput(format!(
            "expected OFF or COFF header, got {magic:?}"
        )));
    }

    let mut next_usize = |what: &str| -> Result<usize> {
        tokens
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("OFF: missing {what}")))?
            .parse::<usize>()
            .map_err(|_| Error::InvalidInput(format!("OFF: bad {what}")))
    };
    let vertex_count = next_usize("vertex count")?;
    let face_count = next_usize("face count")?;
    let _edge_count = next_usize("edge count")?;

    let mut mesh = PolyMesh::new();
    mesh.vertices.reserve(vertex_count);
    let mut tokens = text.split_ascii_whitespace().skip(4);

    for i in 0..vertex_count {
        let mut coord = [0.0f64; 3];
        for c in &mut coord {
            *c = tokens
                .next()
                .ok_or_else(|| Error::InvalidInput(format!("OFF: vertex {i} truncated")))?
                .parse::<f64>()
                .map_err(|_| Error::InvalidInput(format!("OFF: vertex {i} not a float")))?;
        }
        mesh.add_vertex(Point3::new(coord[0], coord[1], coord[2]));
    }

    for i in 0..face_count {
        let n = tokens
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("OFF: face {i} truncated")))?
            .parse::<usize>()
            .map_err(|_| Error::InvalidInput(format!("OFF: face {i} bad vertex count")))?;
        let mut face = Vec::with_capacity(n);
        for _ in 0..n {
            let idx = tokens
                .next()
                .ok_or_else(|| Error::InvalidInput(format!("OFF: face {i} truncated")))?
                .parse::<u32>()
                .map_err(|_| Error::InvalidInput(format!("OFF: face {i} bad index")))?;
            face.push(idx);
        }
        mesh.add_face(face);
    }

    mesh.validate()?;
    Ok(mesh)
}

/// Reads an OFF/COFF mesh from disk.
pub fn read_off_path<P: AsRef<Path>>(path: P) -> Result<PolyMesh> {
    let text = fs::read_to_string(path)?;
    read_off(&text)
}

/// Writes a mesh as COFF (the variant the cylinder extruder emits).
pub fn write_coff<W: Write>(w: &mut W, mesh: &PolyMesh) -> Result<()> {
    writeln!(w, "COFF")?;
    writeln!(w, "{} {} 0", mesh.vertices.len(), mesh.faces.len())?;
    for v in &mesh.vertices {
        writeln!(w, "{} {} {}", v.x, v.y, v.z)?;
    }
    for face in &mesh.faces {
        write!(w, "{}", face.len())?;
        for idx in face {
            write!(w, " {idx}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const UNIT_TRIANGLE: &str = "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";

    #[test]
    fn reads_off_triangle() {
        let mesh = read_off(UNIT_TRIANGLE).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.faces.len(), 1);
        assert_relative_eq!(mesh.vertices[1].x, 1.0);
        assert_eq!(mesh.faces[0].as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn roundtrips_through_coff() {
        let mesh = read_off(UNIT_TRIANGLE).unwrap();
        let mut out = Vec::new();
        write_coff(&mut out, &mesh).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("COFF\n3 1 0\n"));

        let back = read_off(&text).unwrap();
        assert_eq!(back.vertices.len(), 3);
        assert_eq!(back.faces[0].as_slice(), mesh.faces[0].as_slice());
    }

    #[test]
    fn rejects_bad_header_and_truncation() {
        assert!(read_off("PLY\n3 1 0\n").is_err());
        assert!(read_off("OFF\n3 1 0\n0 0 0\n1 0 0\n").is_err());
        // face referencing a missing vertex
        assert!(read_off("OFF\n1 1 0\n0 0 0\n3 0 1 2\n").is_err());
    }
}
