// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall segments and their id allocation.

use std::time::SystemTime;

use nalgebra::{Point2, Point3, Vector2};

/// Hands out monotonically increasing wall ids.
///
/// One allocator per pipeline run; ids depend only on emission order, so a
/// fixed seed reproduces them exactly.
#[derive(Debug, Default)]
pub struct WallIdAllocator {
    next: u32,
}

impl WallIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A fitted wall: a vertical quad footprint with thickness.
#[derive(Debug, Clone)]
pub struct WallSegment {
    pub id: u32,
    /// Bottom start corner.
    pub start: Point3<f64>,
    /// Bottom end corner.
    pub end: Point3<f64>,
    /// Outward normal in the plan, unit length, orthogonal to end - start.
    pub normal: Vector2<f64>,
    /// Meters, >= 0.
    pub thickness: f64,
    /// Ceiling minus floor at the segment midpoint, > 0.
    pub height: f64,
    /// Indices of supporting points in the cloud the fit ran over.
    pub supports: Vec<u32>,
    /// Strokes that produced this segment; empty for unguided walls.
    pub stroke_ids: Vec<u32>,
    /// Supporting inliers over queried neighborhood, in [0, 1].
    pub confidence: f64,
    /// Not part of the deterministic identity of the segment.
    pub created_at: SystemTime,
}

impl WallSegment {
    pub fn start_2d(&self) -> Point2<f64> {
        Point2::new(self.start.x, self.start.y)
    }

    pub fn end_2d(&self) -> Point2<f64> {
        Point2::new(self.end.x, self.end.y)
    }

    /// Plan-view length in meters.
    pub fn length(&self) -> f64 {
        (self.end_2d() - self.start_2d()).norm()
    }

    /// Unit plan direction from start to end.
    pub fn direction(&self) -> Vector2<f64> {
        (self.end_2d() - self.start_2d()).normalize()
    }
}
