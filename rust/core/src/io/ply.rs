// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary little-endian PLY point export.
//!
//! Point-only layout: six f32 properties (`x y z nx ny nz`) followed by
//! three `uchar` colors: 27 bytes per vertex record, no face element.

use std::io::Write;

use crate::error::Result;
use crate::types::{PointSample, Rgba8};

/// Bytes per vertex record: 6 × f32 + 3 × u8.
pub const VERTEX_RECORD_BYTES: usize = 27;

/// Writes a point-only binary PLY. Samples without a stored normal get a
/// zero normal.
pub fn write_ply_points<W: Write>(w: &mut W, samples: &[PointSample], color: Rgba8) -> Result<()> {
    write!(
        w,
        "ply\n\
         format binary_little_endian 1.0\n\
         element vertex {}\n\
         property float x\n\
         property float y\n\
         property float z\n\
         property float nx\n\
         property float ny\n\
         property float nz\n\
         property uchar red\n\
         property uchar green\n\
         property uchar blue\n\
         end_header\n",
        samples.len()
    )?;

    let mut record = [0u8; VERTEX_RECORD_BYTES];
    for s in samples {
        let n = s.normal_or_zero();
        record[0..4].copy_from_slice(&s.position.x.to_le_bytes());
        record[4..8].copy_from_slice(&s.position.y.to_le_bytes());
        record[8..12].copy_from_slice(&s.position.z.to_le_bytes());
        record[12..16].copy_from_slice(&n.x.to_le_bytes());
        record[16..20].copy_from_slice(&n.y.to_le_bytes());
        record[20..24].copy_from_slice(&n.z.to_le_bytes());
        record[24] = color.r;
        record[25] = color.g;
        record[26] = color.b;
        w.write_all(&record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn record_layout_is_27_bytes() {
        let samples = vec![
            PointSample::new(
                Point3::new(1.0, 2.0, 3.0),
                Some(Vector3::new(0.0, 1.0, 0.0)),
                0,
            ),
            PointSample::new(Point3::new(-1.0, 0.5, 0.0), None, 0),
        ];
        let mut out = Vec::new();
        write_ply_points(&mut out, &samples, Rgba8::WHITE).unwrap();

        let header_end = out
            .windows(11)
            .position(|w| w == b"end_header\n")
            .expect("header terminator")
            + 11;
        let body = &out[header_end..];
        assert_eq!(body.len(), 2 * VERTEX_RECORD_BYTES);

        // First record: x=1.0 little endian
        assert_eq!(&body[0..4], &1.0f32.to_le_bytes());
        // ny of first record
        assert_eq!(&body[16..20], &1.0f32.to_le_bytes());
        // Color bytes
        assert_eq!(&body[24..27], &[255, 255, 255]);
        // Second record has zero normal
        assert_eq!(
            &body[VERTEX_RECORD_BYTES + 12..VERTEX_RECORD_BYTES + 24],
            &[0u8; 12]
        );
    }

    #[test]
    fn header_declares_vertex_count() {
        let samples = vec![PointSample::new(Point3::origin(), None, 0); 5];
        let mut out = Vec::new();
        write_ply_points(&mut out, &samples, Rgba8::new(10, 20, 30, 255)).unwrap();
        let header = String::from_utf8_lossy(&out);
        assert!(header.contains("element vertex 5"));
        assert!(header.contains("format binary_little_endian 1.0"));
        assert!(!header.contains("element face"));
    }
}
