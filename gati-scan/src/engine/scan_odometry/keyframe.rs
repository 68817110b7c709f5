//! Reference scan ownership and the keyframe test.
//!
//! Every scan is matched against the current keyframe rather than against the
//! previous scan, so drift only accumulates when the keyframe is replaced.
//! The keyframe is replaced once the platform has moved far enough from the
//! keyframe anchor that the overlap starts to shrink.

use serde::{Deserialize, Serialize};

use crate::core::types::{NormalizedPointSet, Pose3D};

/// Thresholds for promoting a matched scan to keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyframeConfig {
    /// Planar distance from the anchor that triggers a new keyframe (meters)
    pub linear_distance: f64,
    /// Heading change from the anchor that triggers a new keyframe (degrees)
    pub angular_distance_deg: f64,
}

impl Default for KeyframeConfig {
    fn default() -> Self {
        Self {
            linear_distance: 0.10,
            angular_distance_deg: 10.0,
        }
    }
}

impl KeyframeConfig {
    pub fn angular_distance(&self) -> f64 {
        self.angular_distance_deg.to_radians()
    }
}

/// Owner of the reference point set and the pose it was captured at.
#[derive(Debug)]
pub struct KeyframeManager {
    config: KeyframeConfig,
    reference: NormalizedPointSet,
    /// Platform pose in the fixed frame when `reference` was captured
    anchor: Pose3D,
    /// Number of keyframes adopted so far, including the first
    count: u64,
}

impl KeyframeManager {
    /// Start with `reference` anchored at `anchor`.
    pub fn new(config: KeyframeConfig, reference: NormalizedPointSet, anchor: Pose3D) -> Self {
        Self {
            config,
            reference,
            anchor,
            count: 1,
        }
    }

    pub fn config(&self) -> &KeyframeConfig {
        &self.config
    }

    pub fn anchor(&self) -> &Pose3D {
        &self.anchor
    }

    pub fn reference(&self) -> &NormalizedPointSet {
        &self.reference
    }

    /// Mutable access for the matcher, which writes scratch state on the set.
    pub fn reference_mut(&mut self) -> &mut NormalizedPointSet {
        &mut self.reference
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether a platform-frame offset from the anchor calls for a new keyframe.
    ///
    /// Only the planar projection of `offset` is considered. With both
    /// thresholds at zero every call fires (frame-to-frame matching).
    pub fn needs_new_keyframe(&self, offset: &Pose3D) -> bool {
        let linear = self.config.linear_distance;
        if linear <= 0.0 && self.config.angular_distance_deg <= 0.0 {
            return true;
        }
        offset.yaw().abs() > self.config.angular_distance()
            || offset.planar_distance_squared() > linear * linear
    }

    /// Apply the keyframe test and adopt `current` when it fires.
    ///
    /// `offset` is the motion from the anchor to `pose`. Returns true when
    /// `current` became the new reference; otherwise it is dropped.
    pub fn update(&mut self, current: NormalizedPointSet, offset: &Pose3D, pose: &Pose3D) -> bool {
        if !self.needs_new_keyframe(offset) {
            return false;
        }
        self.reference = current;
        self.anchor = *pose;
        self.count += 1;
        log::debug!(
            "New keyframe #{} at x={:.3} y={:.3} yaw={:.3}",
            self.count,
            pose.x(),
            pose.y(),
            pose.yaw()
        );
        true
    }
}
