//! Output covariance selection.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::core::types::{PoseCovariance, Pose3D};

/// Static covariance used when the matcher does not provide one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CovarianceConfig {
    /// Variances along x, y, z; only x and y are used
    pub position: [f64; 3],
    /// Variances about roll, pitch, yaw; only yaw is used
    pub orientation: [f64; 3],
}

impl Default for CovarianceConfig {
    fn default() -> Self {
        Self {
            position: [1e-9; 3],
            orientation: [1e-9; 3],
        }
    }
}

impl CovarianceConfig {
    pub fn static_covariance(&self) -> PoseCovariance {
        PoseCovariance::diagonal(self.position[0], self.position[1], self.orientation[2])
    }
}

/// Picks matcher covariance or the static fallback.
#[derive(Debug, Clone)]
pub struct CovarianceResolver {
    use_matcher: bool,
    fallback: PoseCovariance,
}

impl CovarianceResolver {
    /// `use_matcher` mirrors the matcher's covariance toggle.
    pub fn new(config: &CovarianceConfig, use_matcher: bool) -> Self {
        Self {
            use_matcher,
            fallback: config.static_covariance(),
        }
    }

    pub fn fallback(&self) -> &PoseCovariance {
        &self.fallback
    }

    /// Covariance for a successful match.
    ///
    /// Matcher covariance is expressed in the keyframe frame; its x/y block
    /// is rotated into the fixed frame by the heading of `anchor`, the
    /// keyframe platform pose. The sensor mount does not enter.
    pub fn resolve(
        &self,
        matcher_covariance: Option<&Matrix3<f64>>,
        anchor: &Pose3D,
    ) -> PoseCovariance {
        match matcher_covariance {
            Some(m) if self.use_matcher => PoseCovariance::from_matrix3(m).rotated(anchor.yaw()),
            _ => self.fallback,
        }
    }
}
