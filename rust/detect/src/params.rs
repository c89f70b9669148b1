// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RANSAC detection parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for plane and cylinder detection.
///
/// Defaults target wall-scale structure in indoor scans measured in meters.
/// Stroke-guided fitting relaxes `min_points` for small neighborhoods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Probability of having found the best primitive before stopping.
    pub probability: f64,
    /// Smallest acceptable inlier count after cluster filtering.
    pub min_points: usize,
    /// Max orthogonal distance from a point to the primitive surface.
    pub epsilon: f64,
    /// Connected-component radius among inliers.
    pub cluster_epsilon: f64,
    /// Min |cos| between a sample normal and the primitive normal.
    pub normal_threshold: f64,
    /// Verticality threshold on |n_z| for wall planes and cylinder axes.
    pub cos_angle: f64,
    /// Hard cap on candidate iterations per round.
    pub max_iterations: usize,
    /// Wall-clock cap per detection call.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            probability: 0.99,
            min_points: 5000,
            epsilon: 0.02,
            cluster_epsilon: 0.5,
            normal_threshold: 0.9,
            cos_angle: 0.08,
            max_iterations: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

impl RansacParams {
    pub fn with_probability(mut self, p: f64) -> Self {
        self.probability = p;
        self
    }

    pub fn with_min_points(mut self, n: usize) -> Self {
        self.min_points = n;
        self
    }

    pub fn with_epsilon(mut self, e: f64) -> Self {
        self.epsilon = e;
        self
    }

    pub fn with_cluster_epsilon(mut self, e: f64) -> Self {
        self.cluster_epsilon = e;
        self
    }

    pub fn with_normal_threshold(mut self, t: f64) -> Self {
        self.normal_threshold = t;
        self
    }

    pub fn with_cos_angle(mut self, c: f64) -> Self {
        self.cos_angle = c;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wall_scale() {
        let p = RansacParams::default();
        assert_eq!(p.min_points, 5000);
        approx::assert_relative_eq!(p.epsilon, 0.02);
        approx::assert_relative_eq!(p.cos_angle, 0.08);
    }

    #[test]
    fn serde_round_trip() {
        let p = RansacParams::default().with_min_points(200).with_epsilon(0.05);
        let json = serde_json::to_string(&p).unwrap();
        let q: RansacParams = serde_json::from_str(&json).unwrap();
        assert_eq!(q.min_points, 200);
        approx::assert_relative_eq!(q.epsilon, 0.05);
    }
}
