//! Static sensor mount calibration.
//!
//! The base→sensor transform is resolved once, on the first scan, and cached
//! for the lifetime of the process. A failed lookup leaves the cache empty so
//! the next scan retries. Dynamic mounts are not supported: once resolved the
//! frame tree is never queried again.

use std::time::Duration;

use crate::core::types::Pose3D;
use crate::error::TransformError;
use crate::io::transform::TransformService;

/// Rigid mount of the sensor on the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCalibration {
    /// Pose of the sensor in the platform frame
    pub base_to_sensor: Pose3D,
    /// Inverse of `base_to_sensor`
    pub sensor_to_base: Pose3D,
}

impl FrameCalibration {
    pub fn new(base_to_sensor: Pose3D) -> Self {
        Self {
            base_to_sensor,
            sensor_to_base: base_to_sensor.inverse(),
        }
    }

    /// Sensor coincident with the platform origin.
    pub fn identity() -> Self {
        Self::new(Pose3D::identity())
    }

    /// Re-express a platform-frame motion in the sensor frame.
    #[inline]
    pub fn to_sensor(&self, platform_offset: &Pose3D) -> Pose3D {
        self.sensor_to_base
            .compose(platform_offset)
            .compose(&self.base_to_sensor)
    }

    /// Re-express a sensor-frame motion in the platform frame.
    #[inline]
    pub fn to_platform(&self, sensor_offset: &Pose3D) -> Pose3D {
        self.base_to_sensor
            .compose(sensor_offset)
            .compose(&self.sensor_to_base)
    }
}

/// Resolve-once cache for [`FrameCalibration`].
#[derive(Debug)]
pub struct CalibrationCache {
    base_frame: String,
    timeout: Duration,
    resolved: Option<FrameCalibration>,
}

impl CalibrationCache {
    pub fn new(base_frame: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_frame: base_frame.into(),
            timeout,
            resolved: None,
        }
    }

    /// Cached calibration, if any.
    pub fn get(&self) -> Option<&FrameCalibration> {
        self.resolved.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Return the cached calibration, querying `tf` only while unresolved.
    pub fn resolve<T>(&mut self, tf: &T, sensor_frame: &str) -> Result<FrameCalibration, TransformError>
    where
        T: TransformService + ?Sized,
    {
        if let Some(calibration) = self.resolved {
            return Ok(calibration);
        }

        let base_to_sensor = tf.resolve_static(&self.base_frame, sensor_frame, self.timeout)?;
        let calibration = FrameCalibration::new(base_to_sensor);
        log::info!(
            "Sensor frame '{}' resolved in '{}': x={:.3} y={:.3} z={:.3} yaw={:.3}",
            sensor_frame,
            self.base_frame,
            base_to_sensor.x(),
            base_to_sensor.y(),
            base_to_sensor.z(),
            base_to_sensor.yaw()
        );
        self.resolved = Some(calibration);
        Ok(calibration)
    }
}
