// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cylinder footprint de-overlap.

use tracing::debug;

use crate::cylinder::Circle2;

/// Deactivates overlapping and oversized footprint circles.
///
/// Circles are ranked by inlier count, strongest first. An oversized circle
/// (radius above `max_radius`) is dropped outright. A weaker circle whose
/// center lies within `r_i + r_j` of a surviving stronger one is engulfed
/// and dropped. Survivors keep their relative order.
pub fn clean_circles(circles: &mut Vec<Circle2>, max_radius: f64) {
    circles.sort_by(|a, b| b.inlier_count.cmp(&a.inlier_count));
    for c in circles.iter_mut() {
        if c.radius > max_radius {
            c.active = false;
        }
    }
    for i in 0..circles.len() {
        if !circles[i].active {
            continue;
        }
        for j in (i + 1)..circles.len() {
            if !circles[j].active {
                continue;
            }
            let dist = (circles[i].center - circles[j].center).norm();
            if dist < circles[i].radius + circles[j].radius {
                circles[j].active = false;
            }
        }
    }
    let kept = circles.iter().filter(|c| c.active).count();
    debug!(total = circles.len(), kept, "cleaned cylinder footprints");
}
