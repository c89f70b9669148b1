// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plain-text floor plan and cylinder sidecar outputs.
//!
//! - Floor plan line set: one wall per line, `x1 y1 x2 y2 nx ny`
//! - Cylinder sidecar: one active circle per line, `cx cy r`
//! - Cylinder approximation: eight sides per cylinder, each side one line
//!   `x1 x2 y1 y2` (the two endpoints of the bottom edge; z comes from the
//!   height resolver)

use std::io::Write;

use crate::error::Result;

/// One floor plan wall line with its unit outward normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorPlanLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub nx: f64,
    pub ny: f64,
}

/// Writes the floor plan line set.
pub fn write_floor_plan<W: Write>(w: &mut W, lines: &[FloorPlanLine]) -> Result<()> {
    for l in lines {
        writeln!(
            w,
            "{:.8} {:.8} {:.8} {:.8} {:.8} {:.8}",
            l.x1, l.y1, l.x2, l.y2, l.nx, l.ny
        )?;
    }
    Ok(())
}

/// Writes the `cx cy r` circle sidecar.
pub fn write_circles<W: Write>(w: &mut W, circles: &[(f64, f64, f64)]) -> Result<()> {
    for &(cx, cy, r) in circles {
        writeln!(w, "{cx} {cy} {r}")?;
    }
    Ok(())
}

/// Writes the multi-segment cylinder approximation: `x1 x2 y1 y2` per side.
pub fn write_cylinder_edges<W: Write>(w: &mut W, edges: &[[f64; 4]]) -> Result<()> {
    for e in edges {
        writeln!(w, "{:.8} {:.8} {:.8} {:.8}", e[0], e[1], e[2], e[3])?;
    }
    Ok(())
}
