//! Prediction strategies, one per motion source.
//!
//! Each strategy inspects its own source and optionally overrides part of
//! the offset accumulated by the strategies ahead of it.

use std::sync::Arc;
use std::time::Duration;

use nalgebra::UnitQuaternion;

use super::sample::SampleCell;
use crate::core::math::elapsed_seconds;
use crate::core::types::{Pose3D, Twist2D};
use crate::io::transform::TransformService;

/// Time span covered by one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionWindow {
    /// Stamp of the last processed scan
    pub from_us: u64,
    /// Stamp of the scan being processed
    pub to_us: u64,
}

impl PredictionWindow {
    pub fn new(from_us: u64, to_us: u64) -> Self {
        Self { from_us, to_us }
    }

    /// Signed window length in seconds.
    pub fn dt(&self) -> f64 {
        elapsed_seconds(self.from_us, self.to_us)
    }
}

/// What a strategy replaces in the running offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredictionOverride {
    /// Replace translation and rotation
    Full(Pose3D),
    /// Replace rotation only, keep translation
    Rotation(UnitQuaternion<f64>),
}

impl PredictionOverride {
    /// Apply onto `offset`.
    pub fn apply(self, offset: Pose3D) -> Pose3D {
        match self {
            PredictionOverride::Full(pose) => pose,
            PredictionOverride::Rotation(q) => offset.with_rotation(q),
        }
    }
}

/// One motion source in the prediction chain.
pub trait PredictionStrategy: Send {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Override for `window`, or `None` to leave the offset untouched.
    fn predict(&mut self, window: &PredictionWindow) -> Option<PredictionOverride>;
}

/// Constant-velocity motion over the window, platform frame.
#[derive(Debug)]
pub struct VelocityPrediction {
    velocity: SampleCell<Twist2D>,
}

impl VelocityPrediction {
    pub fn new(velocity: SampleCell<Twist2D>) -> Self {
        Self { velocity }
    }
}

impl PredictionStrategy for VelocityPrediction {
    fn name(&self) -> &'static str {
        "velocity"
    }

    fn predict(&mut self, window: &PredictionWindow) -> Option<PredictionOverride> {
        let twist = self.velocity.lock().latest_or_initial();
        let dt = window.dt();
        Some(PredictionOverride::Full(Pose3D::from_xy_yaw(
            dt * twist.vx,
            dt * twist.vy,
            dt * twist.wz,
        )))
    }
}

/// Relative wheel odometry since the previous prediction.
#[derive(Debug)]
pub struct OdometryPrediction {
    odometry: SampleCell<Pose3D>,
}

impl OdometryPrediction {
    pub fn new(odometry: SampleCell<Pose3D>) -> Self {
        Self { odometry }
    }
}

impl PredictionStrategy for OdometryPrediction {
    fn name(&self) -> &'static str {
        "odometry"
    }

    fn predict(&mut self, _window: &PredictionWindow) -> Option<PredictionOverride> {
        let mut sample = self.odometry.lock();
        let (last_used, latest) = sample.consume()?;
        Some(PredictionOverride::Full(last_used.inverse().compose(&latest)))
    }
}

/// Relative inertial rotation since the previous prediction.
#[derive(Debug)]
pub struct ImuPrediction {
    orientation: SampleCell<UnitQuaternion<f64>>,
}

impl ImuPrediction {
    pub fn new(orientation: SampleCell<UnitQuaternion<f64>>) -> Self {
        Self { orientation }
    }
}

impl PredictionStrategy for ImuPrediction {
    fn name(&self) -> &'static str {
        "imu"
    }

    fn predict(&mut self, _window: &PredictionWindow) -> Option<PredictionOverride> {
        let mut sample = self.orientation.lock();
        let (last_used, latest) = sample.consume()?;
        Some(PredictionOverride::Rotation(last_used.inverse() * latest))
    }
}

/// Platform motion looked up in the frame tree.
pub struct TransformPrediction {
    tf: Arc<dyn TransformService>,
    base_frame: String,
    fixed_frame: String,
    timeout: Duration,
}

impl TransformPrediction {
    pub fn new(
        tf: Arc<dyn TransformService>,
        base_frame: impl Into<String>,
        fixed_frame: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            tf,
            base_frame: base_frame.into(),
            fixed_frame: fixed_frame.into(),
            timeout,
        }
    }
}

impl PredictionStrategy for TransformPrediction {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn predict(&mut self, window: &PredictionWindow) -> Option<PredictionOverride> {
        match self.tf.relative_transform(
            &self.base_frame,
            window.from_us,
            window.to_us,
            &self.fixed_frame,
            self.timeout,
        ) {
            Ok(offset) => Some(PredictionOverride::Full(offset)),
            Err(e) => {
                log::warn!("Could not get platform motion from the frame tree: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Timestamped;
    use crate::io::transform::TransformBuffer;
    use crate::sensors::motion::MotionInputs;
    use approx::assert_relative_eq;

    #[test]
    fn test_velocity_integrates_over_window() {
        let inputs = MotionInputs::default();
        inputs.on_velocity(Twist2D::new(0.5, -0.2, 0.1));
        let mut strategy = VelocityPrediction::new(inputs.velocity_cell());

        let window = PredictionWindow::new(1_000_000, 1_200_000);
        let Some(PredictionOverride::Full(p)) = strategy.predict(&window) else {
            panic!("velocity must yield a full override");
        };
        assert_relative_eq!(p.x(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(p.y(), -0.04, epsilon = 1e-12);
        assert_relative_eq!(p.yaw(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_without_sample_is_identity() {
        let inputs = MotionInputs::default();
        let mut strategy = VelocityPrediction::new(inputs.velocity_cell());
        let Some(PredictionOverride::Full(p)) = strategy.predict(&PredictionWindow::new(0, 500_000))
        else {
            panic!("velocity must yield a full override");
        };
        assert_relative_eq!(p.x(), 0.0);
        assert_relative_eq!(p.yaw(), 0.0);
    }

    #[test]
    fn test_odometry_consumes_sample() {
        let inputs = MotionInputs::default();
        let mut strategy = OdometryPrediction::new(inputs.odometry_cell());
        let window = PredictionWindow::new(0, 1);

        assert!(strategy.predict(&window).is_none());

        inputs.on_odometry(Timestamped::new(Pose3D::from_xy_yaw(1.0, 1.0, 0.5), 1));
        inputs.on_odometry(Timestamped::new(Pose3D::from_xy_yaw(1.5, 1.0, 0.5), 2));

        let Some(PredictionOverride::Full(p)) = strategy.predict(&window) else {
            panic!("odometry must yield a full override");
        };
        let (s, c) = 0.5f64.sin_cos();
        assert_relative_eq!(p.x(), 0.5 * c, epsilon = 1e-12);
        assert_relative_eq!(p.y(), -0.5 * s, epsilon = 1e-12);

        // Consumed: no motion until the next sample
        let Some(PredictionOverride::Full(p)) = strategy.predict(&window) else {
            panic!("odometry must yield a full override");
        };
        assert_relative_eq!(p.planar_distance_squared(), 0.0, epsilon = 1e-24);
    }

    #[test]
    fn test_imu_rotation_override() {
        let inputs = MotionInputs::default();
        let mut strategy = ImuPrediction::new(inputs.orientation_cell());
        inputs.on_imu(Timestamped::new(UnitQuaternion::from_euler_angles(0.0, 0.0, 0.2), 1));
        inputs.on_imu(Timestamped::new(UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5), 2));

        let result = strategy
            .predict(&PredictionWindow::new(0, 2))
            .map(|o| o.apply(Pose3D::from_xy_yaw(1.0, 2.0, -1.0)))
            .unwrap();
        assert_relative_eq!(result.x(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.y(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(result.yaw(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_failure_yields_none() {
        let tf: Arc<dyn TransformService> = Arc::new(TransformBuffer::new());
        let mut strategy = TransformPrediction::new(tf, "base_link", "world", Duration::ZERO);
        assert!(strategy.predict(&PredictionWindow::new(0, 100)).is_none());
    }

    #[test]
    fn test_transform_success_is_full_override() {
        let buffer = Arc::new(TransformBuffer::new());
        buffer.set_transform("world", "base_link", 0, Pose3D::from_xy_yaw(0.0, 0.0, 0.0));
        buffer.set_transform("world", "base_link", 100, Pose3D::from_xy_yaw(0.4, 0.0, 0.1));
        let tf: Arc<dyn TransformService> = buffer;
        let mut strategy = TransformPrediction::new(tf, "base_link", "world", Duration::ZERO);

        let result = strategy
            .predict(&PredictionWindow::new(0, 100))
            .map(|o| o.apply(Pose3D::from_xy_yaw(9.0, 9.0, 1.0)))
            .unwrap();
        assert_relative_eq!(result.x(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(result.yaw(), 0.1, epsilon = 1e-12);
    }
}
