// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Floor and ceiling height resolution from reconstructed 2.5D meshes.
//!
//! A plan-view query point is located inside a face by casting an upward
//! ray in 2D and counting edge crossings; the height is the intersection of
//! the vertical line through the query with the plane of three
//! non-collinear face vertices.

use nalgebra::{Point2, Point3};
use planscan_core::{Error, PolyMesh, Result};

const COLLINEAR_SQ: f64 = 1e-6;

/// Resolved floor/ceiling heights at a plan position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightPair {
    pub floor: f64,
    pub ceiling: f64,
}

impl HeightPair {
    pub fn span(&self) -> f64 {
        self.ceiling - self.floor
    }
}

/// Owns the floor and ceiling meshes for one reconstruction run.
#[derive(Debug)]
pub struct HeightField {
    floor: PolyMesh,
    ceiling: PolyMesh,
}

impl HeightField {
    pub fn new(floor: PolyMesh, ceiling: PolyMesh) -> Self {
        Self { floor, ceiling }
    }

    /// Both heights at `q`, or [`Error::ResolverMiss`] when either mesh has
    /// no containing face.
    pub fn resolve(&self, q: &Point2<f64>) -> Result<HeightPair> {
        let floor = resolve_on(&self.floor, q)?;
        let ceiling = resolve_on(&self.ceiling, q)?;
        Ok(HeightPair { floor, ceiling })
    }

    pub fn floor_mesh(&self) -> &PolyMesh {
        &self.floor
    }

    pub fn ceiling_mesh(&self) -> &PolyMesh {
        &self.ceiling
    }
}

fn resolve_on(mesh: &PolyMesh, q: &Point2<f64>) -> Result<f64> {
    for face in &mesh.faces {
        if face.len() < 3 {
            continue;
        }
        if !face_contains(mesh, face, q) {
            continue;
        }
        if let Some(z) = lift_to_face_plane(mesh, face, q) {
            return Ok(z);
        }
        // Degenerate face; keep searching for a better one.
    }
    Err(Error::ResolverMiss { x: q.x, y: q.y })
}

/// Upward-ray crossing test against the face boundary in plan view.
fn face_contains(mesh: &PolyMesh, face: &[u32], q: &Point2<f64>) -> bool {
    let mut crossings = 0;
    for i in 0..face.len() {
        let a3 = &mesh.vertices[face[i] as usize];
        let b3 = &mesh.vertices[face[(i + 1) % face.len()] as usize];
        let (a, b) = (Point2::new(a3.x, a3.y), Point2::new(b3.x, b3.y));
        // Points exactly on an edge count as inside.
        if on_segment(&a, &b, q) {
            return true;
        }
        // Half-open interval on x keeps shared vertices from double counting.
        if (a.x <= q.x) != (b.x <= q.x) {
            let t = (q.x - a.x) / (b.x - a.x);
            let y_at = a.y + t * (b.y - a.y);
            if y_at >= q.y {
                crossings += 1;
            }
        }
    }
    crossings % 2 == 1
}

fn on_segment(a: &Point2<f64>, b: &Point2<f64>, q: &Point2<f64>) -> bool {
    let ab = b - a;
    let aq = q - a;
    let cross = ab.x * aq.y - ab.y * aq.x;
    if cross.abs() > 1e-9 {
        return false;
    }
    let dot = aq.dot(&ab);
    dot >= 0.0 && dot <= ab.norm_squared()
}

/// Height of the face's supporting plane at `q`, from three non-collinear
/// vertices. `None` when every vertex triple is collinear.
fn lift_to_face_plane(mesh: &PolyMesh, face: &[u32], q: &Point2<f64>) -> Option<f64> {
    let p1 = mesh.vertices[face[0] as usize];
    let mut p2 = p1;
    for &v in face {
        let p = mesh.vertices[v as usize];
        if (p - p1).norm_squared() > COLLINEAR_SQ {
            p2 = p;
            break;
        }
    }
    let mut p3 = p1;
    let dir12 = p2 - p1;
    for &v in face {
        let p = mesh.vertices[v as usize];
        if (p - p1).norm_squared() <= COLLINEAR_SQ || (p - p2).norm_squared() <= COLLINEAR_SQ {
            continue;
        }
        // Skip vertices on the p1-p2 line.
        let t = (p - p1).dot(&dir12) / dir12.norm_squared();
        let proj = p1 + dir12 * t;
        if (p - proj).norm_squared() <= COLLINEAR_SQ {
            continue;
        }
        p3 = p;
        break;
    }
    if p3 == p1 || p2 == p1 {
        return None;
    }
    let normal = (p2 - p1).cross(&(p3 - p1));
    if normal.z.abs() < 1e-12 {
        // Face plane is vertical; a plan query cannot intersect it.
        return None;
    }
    let d = -normal.dot(&p1.coords);
    Some(-(normal.x * q.x + normal.y * q.y + d) / normal.z)
}

/// Builds a height field by loading `floor.off` and `ceiling.off` from a
/// directory, the layout the surface reconstruction step writes.
pub fn load_height_field(dir: &std::path::Path) -> Result<HeightField> {
    let floor = planscan_core::io::off::read_off_path(&dir.join("floor.off"))?;
    let ceiling = planscan_core::io::off::read_off_path(&dir.join("ceiling.off"))?;
    Ok(HeightField::new(floor, ceiling))
}

/// Flat fallback field from constant floor/ceiling heights, covering
/// `bounds` in plan view. Used when no reconstructed meshes exist.
pub fn flat_height_field(
    min: Point2<f64>,
    max: Point2<f64>,
    floor_z: f64,
    ceiling_z: f64,
) -> HeightField {
    let quad = |z: f64| {
        let mut mesh = PolyMesh::new();
        let a = mesh.add_vertex(Point3::new(min.x, min.y, z));
        let b = mesh.add_vertex(Point3::new(max.x, min.y, z));
        let c = mesh.add_vertex(Point3::new(max.x, max.y, z));
        let d = mesh.add_vertex(Point3::new(min.x, max.y, z));
        mesh.add_face([a, b, c, d]);
        mesh
    };
    HeightField::new(quad(floor_z), quad(ceiling_z))
}
