//! Motion prediction between consecutive scans.
//!
//! Motion sources arrive asynchronously and are kept as latest-sample cells
//! ([`MotionInputs`]). At the start of each matching cycle the
//! [`MotionPredictor`] walks its strategies in a fixed priority order,
//! starting from the identity offset; later strategies override earlier ones:
//!
//! ```text
//! identity → velocity (full) → odometry (full) → imu (rotation) → frame tree (full)
//! ```
//!
//! The frame tree therefore wins outright when it answers, the inertial
//! rotation beats odometry and velocity for heading, and odometry supplies
//! translation otherwise.

mod sample;
mod strategy;

pub use sample::{MotionInputs, MotionSample, SampleCell, VelocityFormat};
pub use strategy::{
    ImuPrediction, OdometryPrediction, PredictionOverride, PredictionStrategy, PredictionWindow,
    TransformPrediction, VelocityPrediction,
};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::math::timeout_from_secs;
use crate::core::types::Pose3D;
use crate::io::transform::TransformService;

const DEFAULT_TF_TIMEOUT_S: f64 = 0.1;

/// Which motion sources feed the first guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Integrate the latest platform velocity over the scan interval
    pub use_vel: bool,
    /// Velocity arrives stamped (otherwise unstamped)
    pub stamped_vel: bool,
    /// Use relative wheel odometry
    pub use_odom: bool,
    /// Use relative inertial orientation for the rotation
    pub use_imu: bool,
    /// Ask the frame tree for the platform motion
    pub use_tf: bool,
    /// Frame tree query timeout in seconds
    pub tf_timeout_s: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            use_vel: false,
            stamped_vel: false,
            use_odom: true,
            use_imu: true,
            use_tf: true,
            tf_timeout_s: DEFAULT_TF_TIMEOUT_S,
        }
    }
}

impl PredictionConfig {
    /// Frame tree query timeout; an unusable value falls back to the default.
    pub fn tf_timeout(&self) -> Duration {
        timeout_from_secs(self.tf_timeout_s).unwrap_or_else(|| {
            log::warn!("Invalid tf_timeout_s {}, using {}", self.tf_timeout_s, DEFAULT_TF_TIMEOUT_S);
            Duration::from_secs_f64(DEFAULT_TF_TIMEOUT_S)
        })
    }

    pub fn velocity_format(&self) -> VelocityFormat {
        if self.stamped_vel {
            VelocityFormat::Stamped
        } else {
            VelocityFormat::Unstamped
        }
    }
}

/// Ordered chain of prediction strategies.
#[derive(Default)]
pub struct MotionPredictor {
    strategies: Vec<Box<dyn PredictionStrategy>>,
}

impl MotionPredictor {
    /// Predictor with no sources; always predicts identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain for the enabled sources, in priority order.
    pub fn from_config(
        config: &PredictionConfig,
        inputs: &MotionInputs,
        tf: Arc<dyn TransformService>,
        base_frame: &str,
        fixed_frame: &str,
    ) -> Self {
        let mut predictor = Self::new();
        if config.use_vel {
            predictor.push(VelocityPrediction::new(inputs.velocity_cell()));
        }
        if config.use_odom {
            predictor.push(OdometryPrediction::new(inputs.odometry_cell()));
        }
        if config.use_imu {
            predictor.push(ImuPrediction::new(inputs.orientation_cell()));
        }
        if config.use_tf {
            predictor.push(TransformPrediction::new(
                tf,
                base_frame,
                fixed_frame,
                config.tf_timeout(),
            ));
        }
        predictor
    }

    /// Append a strategy. It runs after, and can override, those already present.
    pub fn push(&mut self, strategy: impl PredictionStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Names of the active strategies in evaluation order.
    pub fn sources(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Predicted platform-frame offset over `window`.
    pub fn predict(&mut self, window: &PredictionWindow) -> Pose3D {
        self.strategies
            .iter_mut()
            .fold(Pose3D::identity(), |offset, strategy| {
                match strategy.predict(window) {
                    Some(o) => o.apply(offset),
                    None => offset,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Timestamped, Twist2D};
    use crate::io::transform::TransformBuffer;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn predictor(config: PredictionConfig, inputs: &MotionInputs, tf: Arc<TransformBuffer>) -> MotionPredictor {
        MotionPredictor::from_config(&config, inputs, tf, "base_link", "world")
    }

    fn only(use_vel: bool, use_odom: bool, use_imu: bool, use_tf: bool) -> PredictionConfig {
        PredictionConfig {
            use_vel,
            use_odom,
            use_imu,
            use_tf,
            tf_timeout_s: 0.0,
            ..PredictionConfig::default()
        }
    }

    #[test]
    fn test_default_order() {
        let inputs = MotionInputs::default();
        let p = predictor(
            only(true, true, true, true),
            &inputs,
            Arc::new(TransformBuffer::new()),
        );
        assert_eq!(p.sources(), vec!["velocity", "odometry", "imu", "transform"]);
    }

    #[test]
    fn test_no_sources_is_identity() {
        let mut p = MotionPredictor::new();
        let offset = p.predict(&PredictionWindow::new(0, 1_000_000));
        assert_eq!(offset, Pose3D::identity());
    }

    #[test]
    fn test_odometry_roundtrip() {
        let inputs = MotionInputs::default();
        let mut p = predictor(only(false, true, false, false), &inputs, Arc::new(TransformBuffer::new()));

        let start = Pose3D::from_xy_yaw(3.2, -1.7, 2.9);
        let delta = Pose3D::from_xy_yaw(0.123, -0.045, 0.31);
        inputs.on_odometry(Timestamped::new(start, 0));
        p.predict(&PredictionWindow::new(0, 0));
        inputs.on_odometry(Timestamped::new(start.compose(&delta), 100));

        let offset = p.predict(&PredictionWindow::new(0, 100));
        assert_relative_eq!(offset.x(), delta.x(), epsilon = 1e-9);
        assert_relative_eq!(offset.y(), delta.y(), epsilon = 1e-9);
        assert_relative_eq!(offset.yaw(), delta.yaw(), epsilon = 1e-9);
    }

    #[test]
    fn test_imu_overrides_rotation_only() {
        let inputs = MotionInputs::default();
        let mut p = predictor(only(true, true, true, false), &inputs, Arc::new(TransformBuffer::new()));

        inputs.on_velocity(Twist2D::new(1.0, 0.0, 2.0));
        inputs.on_odometry(Timestamped::new(Pose3D::identity(), 0));
        inputs.on_imu(Timestamped::new(UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0), 0));
        p.predict(&PredictionWindow::new(0, 0));

        inputs.on_odometry(Timestamped::new(Pose3D::from_xy_yaw(0.2, 0.0, 0.9), 50));
        inputs.on_imu(Timestamped::new(UnitQuaternion::from_euler_angles(0.0, 0.0, 1.05), 50));

        let offset = p.predict(&PredictionWindow::new(0, 100_000));
        assert_relative_eq!(offset.x(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(offset.yaw(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_alone() {
        let inputs = MotionInputs::default();
        let mut p = predictor(only(true, false, false, false), &inputs, Arc::new(TransformBuffer::new()));
        inputs.on_velocity(Twist2D::new(0.4, 0.0, 0.0));
        let offset = p.predict(&PredictionWindow::new(0, 500_000));
        assert_relative_eq!(offset.x(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_supersedes_everything() {
        let inputs = MotionInputs::default();
        let tf = Arc::new(TransformBuffer::new());
        tf.set_transform("world", "base_link", 0, Pose3D::identity());
        tf.set_transform("world", "base_link", 100, Pose3D::from_xy_yaw(-0.3, 0.0, 0.0));
        let mut p = predictor(only(true, true, true, true), &inputs, tf);

        inputs.on_velocity(Twist2D::new(1.0, 1.0, 1.0));
        inputs.on_imu(Timestamped::new(UnitQuaternion::from_euler_angles(0.0, 0.0, 0.7), 0));

        let offset = p.predict(&PredictionWindow::new(0, 100));
        assert_relative_eq!(offset.x(), -0.3, epsilon = 1e-12);
        assert_relative_eq!(offset.yaw(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_failure_keeps_lower_sources() {
        let inputs = MotionInputs::default();
        let mut p = predictor(only(true, false, false, true), &inputs, Arc::new(TransformBuffer::new()));
        inputs.on_velocity(Twist2D::new(0.0, 0.0, 1.0));
        let offset = p.predict(&PredictionWindow::new(0, 250_000));
        assert_relative_eq!(offset.yaw(), 0.25, epsilon = 1e-12);
    }
}
