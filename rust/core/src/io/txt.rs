// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Labeled text cloud format.
//!
//! One point per line: `x y z label nx ny nz`, whitespace-separated,
//! integers or floats. Consecutive lines with the same label form a
//! [`crate::LabelGroup`]; a label change starts a new group. Comments and
//! blank lines are not part of the format and are rejected.
//!
//! Floats are parsed with [fast-float], labels with [lexical-core], and
//! lines are scanned with [memchr].

use std::fs;
use std::io::Write;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use tracing::info;

use crate::cloud::PointCloud;
use crate::error::{Error, Result};
use crate::types::PointSample;

#[inline]
fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t' || bytes[pos] == b'\r') {
        pos += 1;
    }
    pos
}

#[inline]
fn parse_f32(bytes: &[u8], pos: usize, line_no: usize) -> Result<(f32, usize)> {
    let pos = skip_spaces(bytes, pos);
    match fast_float::parse_partial::<f32, _>(&bytes[pos..]) {
        Ok((value, consumed)) if consumed > 0 => Ok((value, pos + consumed)),
        _ => Err(Error::InvalidInput(format!(
            "line {line_no}: expected a number"
        ))),
    }
}

#[inline]
fn parse_label(bytes: &[u8], pos: usize, line_no: usize) -> Result<(u32, usize)> {
    let pos = skip_spaces(bytes, pos);
    match lexical_core::parse_partial::<u32>(&bytes[pos..]) {
        Ok((value, consumed)) if consumed > 0 => Ok((value, pos + consumed)),
        _ => Err(Error::InvalidInput(format!(
            "line {line_no}: expected an integer label"
        ))),
    }
}

/// Parses one `x y z label nx ny nz` record.
fn parse_line(line: &[u8], line_no: usize) -> Result<PointSample> {
    let (x, pos) = parse_f32(line, 0, line_no)?;
    let (y, pos) = parse_f32(line, pos, line_no)?;
    let (z, pos) = parse_f32(line, pos, line_no)?;
    let (label, pos) = parse_label(line, pos, line_no)?;
    let (nx, pos) = parse_f32(line, pos, line_no)?;
    let (ny, pos) = parse_f32(line, pos, line_no)?;
    let (nz, pos) = parse_f32(line, pos, line_no)?;

    let rest = skip_spaces(line, pos);
    if rest != line.len() {
        return Err(Error::InvalidInput(format!(
            "line {line_no}: trailing garbage after 7 fields"
        )));
    }

    Ok(PointSample::new(
        Point3::new(x, y, z),
        Some(Vector3::new(nx, ny, nz)),
        label,
    ))
}

/// Parses a whole text cloud from raw bytes.
pub fn read_cloud(bytes: &[u8]) -> Result<PointCloud> {
    // ~30 bytes per line is typical for metric interior scans
    let mut samples = Vec::with_capacity(bytes.len() / 30);
    let mut start = 0usize;
    let mut line_no = 0usize;

    for nl in memchr::memchr_iter(b'\n', bytes) {
        line_no += 1;
        let line = &bytes[start..nl];
        start = nl + 1;
        samples.push(parse_line(line, line_no)?);
    }
    if start < bytes.len() {
        // final line without trailing newline
        line_no += 1;
        samples.push(parse_line(&bytes[start..], line_no)?);
    }

    let cloud = PointCloud::from_samples(samples)?;
    info!(
        points = cloud.len(),
        groups = cloud.groups().len(),
        "loaded text cloud"
    );
    Ok(cloud)
}

/// Reads a text cloud from disk.
pub fn read_cloud_path<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let bytes = fs::read(path)?;
    read_cloud(&bytes)
}

/// Writes classified points as `x y z` lines (the wall/floor/ceiling
/// exports of the detection phase).
pub fn write_points<W: Write>(w: &mut W, samples: &[PointSample]) -> Result<()> {
    for s in samples {
        writeln!(w, "{} {} {}", s.position.x, s.position.y, s.position.z)?;
    }
    Ok(())
}
