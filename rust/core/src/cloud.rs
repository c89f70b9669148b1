// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cloud store: owns the labeled sample array and its label groups.
//!
//! Labels partition the input; a group is a contiguous index range that
//! starts whenever the label differs from the previous line's label. The
//! cloud is immutable for the duration of a pipeline run; spatial indices
//! hold indices into it and are invalidated by any rebuild.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::types::{Aabb, PointSample};

/// A contiguous index range of samples sharing one label.
///
/// Created at load, immutable thereafter. The same label value can appear
/// in several groups if it recurs after an interruption in the source
/// ordering; each run is its own group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGroup {
    pub label: u32,
    pub range: Range<usize>,
}

impl LabelGroup {
    #[inline]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Global z statistics of the full cloud, used by the floor/ceiling split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZStats {
    pub min_z: f64,
    pub max_z: f64,
    pub mean_z: f64,
}

/// The labeled point cloud store.
#[derive(Debug, Clone)]
pub struct PointCloud {
    samples: Vec<PointSample>,
    groups: Vec<LabelGroup>,
    bounds: Aabb,
    z_stats: ZStats,
}

impl PointCloud {
    /// Builds a cloud from samples in source order, deriving label groups
    /// from label-change boundaries and the global bounds / z statistics.
    ///
    /// Fails with [`Error::InvalidInput`] on an empty sample list or any
    /// non-finite coordinate.
    pub fn from_samples(samples: Vec<PointSample>) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::InvalidInput("empty point cloud".into()));
        }

        let mut bounds = Aabb::empty();
        let mut sum_z = 0.0f64;
        for (i, s) in samples.iter().enumerate() {
            let p = &s.position;
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "non-finite coordinate at sample {i}"
                )));
            }
            bounds.expand(p);
            sum_z += p.z as f64;
        }

        let mut groups = Vec::new();
        let mut start = 0usize;
        let mut current = samples[0].label;
        for (i, s) in samples.iter().enumerate().skip(1) {
            if s.label != current {
                groups.push(LabelGroup {
                    label: current,
                    range: start..i,
                });
                start = i;
                current = s.label;
            }
        }
        groups.push(LabelGroup {
            label: current,
            range: start..samples.len(),
        });

        let z_stats = ZStats {
            min_z: bounds.min.z as f64,
            max_z: bounds.max.z as f64,
            mean_z: sum_z / samples.len() as f64,
        };

        Ok(Self {
            samples,
            groups,
            bounds,
            z_stats,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn samples(&self) -> &[PointSample] {
        &self.samples
    }

    #[inline]
    pub fn sample(&self, index: usize) -> &PointSample {
        &self.samples[index]
    }

    /// Label groups in order of first appearance.
    #[inline]
    pub fn groups(&self) -> &[LabelGroup] {
        &self.groups
    }

    /// Samples of one label group.
    #[inline]
    pub fn group_samples(&self, group: &LabelGroup) -> &[PointSample] {
        &self.samples[group.range.clone()]
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[inline]
    pub fn z_stats(&self) -> ZStats {
        self.z_stats
    }
}
