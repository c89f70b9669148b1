// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 3D wireframe extrusion of regularized walls and cylinder footprints.
//!
//! Cylinders become octagonal prisms: eight ring vertices per footprint,
//! each lifted to the floor and ceiling heights resolved at its own plan
//! position, one quad per side. A footprint whose ring leaves the resolved
//! surfaces is dropped whole.

use nalgebra::{Point2, Point3, Vector2};
use tracing::warn;

use planscan_core::{Error, PolyMesh, Result};
use planscan_detect::Circle2;

use crate::height::HeightField;
use crate::wall::WallSegment;

const SQRT_HALF: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// One bottom edge of a prism side: `[x1, x2, y1, y2]`, the sidecar layout.
pub type PrismEdge = [f64; 4];

/// Extrudes wall segments into vertical quads.
pub fn extrude_walls(walls: &[WallSegment]) -> PolyMesh {
    let mut mesh = PolyMesh::new();
    for wall in walls {
        let s = wall.start;
        let e = wall.end;
        let a = add_deduped(&mut mesh, Point3::new(s.x, s.y, s.z));
        let b = add_deduped(&mut mesh, Point3::new(e.x, e.y, e.z));
        let c = add_deduped(&mut mesh, Point3::new(e.x, e.y, e.z + wall.height));
        let d = add_deduped(&mut mesh, Point3::new(s.x, s.y, s.z + wall.height));
        mesh.add_face([a, b, c, d]);
    }
    mesh
}

/// Extrudes active footprint circles into octagonal prisms.
///
/// Returns the prism mesh plus the per-side bottom edges for the sidecar
/// file. Footprints the resolver cannot place are skipped with a warning.
pub fn extrude_cylinders(
    circles: &[Circle2],
    heights: &HeightField,
) -> Result<(PolyMesh, Vec<PrismEdge>)> {
    let mut mesh = PolyMesh::new();
    let mut edges = Vec::new();

    for circle in circles.iter().filter(|c| c.active) {
        let ring = ring_vertices(circle);
        let mut lifted = Vec::with_capacity(8);
        let mut miss = false;
        for v in &ring {
            match heights.resolve(v) {
                Ok(pair) => lifted.push((*v, pair)),
                Err(Error::ResolverMiss { x, y }) => {
                    warn!(x, y, "cylinder ring vertex outside height meshes, dropping");
                    miss = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        if miss {
            continue;
        }
        for j in 0..8 {
            let (v0, h0) = &lifted[j];
            let (v1, h1) = &lifted[(j + 1) % 8];
            let bottom0 = add_deduped(&mut mesh, Point3::new(v0.x, v0.y, h0.floor));
            let top0 = add_deduped(&mut mesh, Point3::new(v0.x, v0.y, h0.ceiling));
            let top1 = add_deduped(&mut mesh, Point3::new(v1.x, v1.y, h1.ceiling));
            let bottom1 = add_deduped(&mut mesh, Point3::new(v1.x, v1.y, h1.floor));
            mesh.add_face([top0, top1, bottom1, bottom0]);
            edges.push([v0.x, v1.x, v0.y, v1.y]);
        }
    }
    Ok((mesh, edges))
}

/// Eight ring vertices of the octagon inscribed around `circle`.
fn ring_vertices(circle: &Circle2) -> [Point2<f64>; 8] {
    let r = circle.radius;
    let d = r * SQRT_HALF;
    let offsets = [
        Vector2::new(0.0, r),
        Vector2::new(d, d),
        Vector2::new(r, 0.0),
        Vector2::new(d, -d),
        Vector2::new(0.0, -r),
        Vector2::new(-d, -d),
        Vector2::new(-r, 0.0),
        Vector2::new(-d, d),
    ];
    offsets.map(|o| circle.center + o)
}

fn add_deduped(mesh: &mut PolyMesh, v: Point3<f64>) -> u32 {
    // Prisms and wall chains share corner vertices exactly.
    if let Some(i) = mesh.vertices.iter().position(|p| *p == v) {
        return i as u32;
    }
    mesh.add_vertex(v)
}
