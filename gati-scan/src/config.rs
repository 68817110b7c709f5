//! Node configuration.
//!
//! Every section is `#[serde(default)]`, so a partial TOML file only needs
//! the values it changes:
//!
//! ```toml
//! [frames]
//! base_frame = "base_link"
//! fixed_frame = "odom"
//!
//! [keyframe]
//! angular_distance_deg = 5.0
//!
//! [matcher]
//! max_iterations = 20
//! do_compute_covariance = true
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::matching::MatcherConfig;
use crate::core::math::timeout_from_secs;
use crate::engine::scan_odometry::{CovarianceConfig, KeyframeConfig, ScanOdometryConfig};
use crate::error::{GatiError, Result};
use crate::io::publish::PublishFlags;
use crate::sensors::motion::PredictionConfig;
use crate::sensors::preprocessing::NormalizerConfig;

const DEFAULT_CALIBRATION_TIMEOUT_S: f64 = 1.0;

/// Frame names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    /// Platform frame whose pose is estimated
    pub base_frame: String,
    /// Frame the pose is reported in
    pub fixed_frame: String,
    /// Bounded wait for the sensor mount lookup, seconds
    pub calibration_timeout_s: f64,
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            base_frame: "base_link".to_string(),
            fixed_frame: "world".to_string(),
            calibration_timeout_s: DEFAULT_CALIBRATION_TIMEOUT_S,
        }
    }
}

impl FramesConfig {
    /// Sensor mount lookup timeout; an unusable value falls back to the default.
    pub fn calibration_timeout(&self) -> Duration {
        timeout_from_secs(self.calibration_timeout_s).unwrap_or_else(|| {
            log::warn!(
                "Invalid calibration_timeout_s {}, using {}",
                self.calibration_timeout_s,
                DEFAULT_CALIBRATION_TIMEOUT_S
            );
            Duration::from_secs_f64(DEFAULT_CALIBRATION_TIMEOUT_S)
        })
    }
}

/// Input modality and cloud preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Consume point clouds instead of ranged scans
    pub use_cloud_input: bool,
    pub cloud_range_min: f64,
    pub cloud_range_max: f64,
    pub cloud_resolution: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        let normalizer = NormalizerConfig::default();
        Self {
            use_cloud_input: false,
            cloud_range_min: normalizer.cloud_range_min,
            cloud_range_max: normalizer.cloud_range_max,
            cloud_resolution: normalizer.cloud_resolution,
        }
    }
}

impl InputConfig {
    pub fn normalizer(&self) -> NormalizerConfig {
        NormalizerConfig {
            cloud_range_min: self.cloud_range_min,
            cloud_range_max: self.cloud_range_max,
            cloud_resolution: self.cloud_resolution,
        }
    }
}

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub publish_tf: bool,
    pub publish_pose: bool,
    pub publish_pose_stamped: bool,
    pub publish_pose_with_covariance: bool,
    pub publish_pose_with_covariance_stamped: bool,
    /// Take roll and pitch of the output from the inertial sensor
    pub add_imu_roll_pitch: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            publish_tf: true,
            publish_pose: true,
            publish_pose_stamped: false,
            publish_pose_with_covariance: false,
            publish_pose_with_covariance_stamped: false,
            add_imu_roll_pitch: false,
        }
    }
}

impl OutputConfig {
    pub fn flags(&self) -> PublishFlags {
        PublishFlags {
            transform: self.publish_tf,
            pose: self.publish_pose,
            pose_stamped: self.publish_pose_stamped,
            pose_with_covariance: self.publish_pose_with_covariance,
            pose_with_covariance_stamped: self.publish_pose_with_covariance_stamped,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub frames: FramesConfig,
    pub input: InputConfig,
    pub keyframe: KeyframeConfig,
    pub prediction: PredictionConfig,
    pub output: OutputConfig,
    pub covariance: CovarianceConfig,
    pub matcher: MatcherConfig,
}

impl NodeConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse TOML text and check the values serde cannot.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = basic_toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timeouts that are negative, not finite or too large to wait on.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("frames.calibration_timeout_s", self.frames.calibration_timeout_s),
            ("prediction.tf_timeout_s", self.prediction.tf_timeout_s),
        ];
        for (name, secs) in timeouts {
            if timeout_from_secs(secs).is_none() {
                return Err(GatiError::Config(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, secs
                )));
            }
        }
        Ok(())
    }

    /// Settings for the scan odometry driver.
    pub fn scan_odometry(&self) -> ScanOdometryConfig {
        ScanOdometryConfig {
            base_frame: self.frames.base_frame.clone(),
            fixed_frame: self.frames.fixed_frame.clone(),
            calibration_timeout: self.frames.calibration_timeout(),
            normalizer: self.input.normalizer(),
            keyframe: self.keyframe,
            prediction: self.prediction,
            covariance: self.covariance,
            use_matcher_covariance: self.matcher.do_compute_covariance,
            add_imu_roll_pitch: self.output.add_imu_roll_pitch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.frames.base_frame, "base_link");
        assert_eq!(config.frames.fixed_frame, "world");
        assert!(!config.input.use_cloud_input);
        assert_eq!(config.keyframe.linear_distance, 0.10);
        assert_eq!(config.keyframe.angular_distance_deg, 10.0);
        assert!(config.prediction.use_imu && config.prediction.use_odom && config.prediction.use_tf);
        assert!(!config.prediction.use_vel);
        assert!(config.output.publish_tf && config.output.publish_pose);
        assert_eq!(config.covariance.position, [1e-9; 3]);
        assert_eq!(config.matcher.max_iterations, 10);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[frames]
fixed_frame = "odom"

[input]
use_cloud_input = true
cloud_resolution = 0.02

[keyframe]
angular_distance_deg = 5.0

[prediction]
use_tf = false

[output]
publish_pose_with_covariance_stamped = true

[covariance]
position = [0.01, 0.02, 0.0]

[matcher]
do_compute_covariance = true
"#
        )
        .unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.frames.fixed_frame, "odom");
        assert_eq!(config.frames.base_frame, "base_link");
        assert!(config.input.use_cloud_input);
        assert_eq!(config.input.cloud_range_max, 50.0);
        assert_eq!(config.keyframe.linear_distance, 0.10);
        assert!(!config.prediction.use_tf);
        assert!(config.output.flags().pose_with_covariance_stamped);

        let odometry = config.scan_odometry();
        assert_eq!(odometry.fixed_frame, "odom");
        assert_eq!(odometry.normalizer.cloud_resolution, 0.02);
        assert_eq!(odometry.keyframe.angular_distance_deg, 5.0);
        assert!(odometry.use_matcher_covariance);
        assert_eq!(odometry.calibration_timeout, Duration::from_secs(1));
        assert_eq!(odometry.covariance.static_covariance().xy, [0.01, 0.0, 0.0, 0.02]);
    }

    #[test]
    fn test_invalid_file() {
        let err = NodeConfig::parse("[keyframe]\nlinear_distance = \"far\"\n").unwrap_err();
        assert!(matches!(err, GatiError::Config(_)));

        let err = NodeConfig::load("/nonexistent/gati-scan.toml").unwrap_err();
        assert!(matches!(err, GatiError::Io(_)));
    }

    #[test]
    fn test_unusable_timeouts_rejected() {
        for text in [
            "[frames]\ncalibration_timeout_s = 1e30\n",
            "[frames]\ncalibration_timeout_s = -0.5\n",
            "[prediction]\ntf_timeout_s = 1e300\n",
        ] {
            let err = NodeConfig::parse(text).unwrap_err();
            assert!(matches!(err, GatiError::Config(_)), "{text}");
        }

        let config = NodeConfig::parse("[prediction]\ntf_timeout_s = 0.25\n").unwrap();
        assert_eq!(config.prediction.tf_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_unusable_timeout_falls_back_to_default() {
        let mut config = NodeConfig::default();
        config.frames.calibration_timeout_s = f64::INFINITY;
        config.prediction.tf_timeout_s = f64::NAN;

        assert!(config.validate().is_err());
        assert_eq!(config.scan_odometry().calibration_timeout, Duration::from_secs(1));
        assert_eq!(config.prediction.tf_timeout(), Duration::from_millis(100));
    }
}
