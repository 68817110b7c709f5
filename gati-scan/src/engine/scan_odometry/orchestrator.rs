//! Per-scan driver: prediction, matching, keyframing and covariance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::covariance::{CovarianceConfig, CovarianceResolver};
use super::keyframe::{KeyframeConfig, KeyframeManager};
use crate::algorithms::matching::{MatchRequest, ScanMatcher};
use crate::core::types::{PoseCovariance, Pose3D, ScanInput, Timestamped, quaternion_from_rpy};
use crate::error::TransformError;
use crate::io::transform::TransformService;
use crate::sensors::calibration::CalibrationCache;
use crate::sensors::motion::{MotionInputs, MotionPredictor, PredictionConfig, PredictionWindow};
use crate::sensors::preprocessing::{NormalizerConfig, PointSetNormalizer};

/// Everything the orchestrator needs besides the matcher itself.
#[derive(Debug, Clone)]
pub struct ScanOdometryConfig {
    /// Platform frame whose pose is estimated
    pub base_frame: String,
    /// Frame the pose is reported in
    pub fixed_frame: String,
    /// Bounded wait for the sensor mount lookup
    pub calibration_timeout: Duration,
    pub normalizer: NormalizerConfig,
    pub keyframe: KeyframeConfig,
    pub prediction: PredictionConfig,
    pub covariance: CovarianceConfig,
    /// Prefer matcher covariance over the static diagonal
    pub use_matcher_covariance: bool,
    /// Replace roll and pitch of the output with the latest inertial sample
    pub add_imu_roll_pitch: bool,
}

impl Default for ScanOdometryConfig {
    fn default() -> Self {
        Self {
            base_frame: "base_link".to_string(),
            fixed_frame: "world".to_string(),
            calibration_timeout: Duration::from_secs(1),
            normalizer: NormalizerConfig::default(),
            keyframe: KeyframeConfig::default(),
            prediction: PredictionConfig::default(),
            covariance: CovarianceConfig::default(),
            use_matcher_covariance: false,
            add_imu_roll_pitch: false,
        }
    }
}

/// One scan or cloud as delivered by the sensor driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Frame the readings are expressed in
    pub frame_id: String,
    pub input: ScanInput,
}

/// Resolved platform pose for one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    /// Platform pose in the fixed frame
    pub pose: Pose3D,
    pub covariance: PoseCovariance,
    pub stamp_us: u64,
    /// The scan became the new keyframe
    pub new_keyframe: bool,
}

/// What happened to one scan.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Sensor mount unresolved; the scan was dropped
    Skipped(TransformError),
    /// The matcher rejected the scan; nothing to publish
    MatchFailed,
    Estimated(PoseEstimate),
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOdometryStats {
    pub scans_processed: u64,
    pub scans_skipped: u64,
    pub matches_failed: u64,
    pub keyframes_created: u64,
}

/// Keyframe-based scan odometry.
///
/// Each scan is matched against the current keyframe, seeded with the
/// motion predicted since the previous scan. The matcher works in the
/// sensor frame with the keyframe pinned at the origin; results are
/// carried back into the platform frame and anchored on the keyframe pose.
pub struct ScanOdometry<M: ScanMatcher> {
    normalizer: PointSetNormalizer,
    calibration: CalibrationCache,
    predictor: MotionPredictor,
    matcher: M,
    covariance: CovarianceResolver,
    keyframe_config: KeyframeConfig,
    /// Created from the first calibrated scan
    keyframe: Option<KeyframeManager>,
    inputs: MotionInputs,
    tf: Arc<dyn TransformService>,
    add_imu_roll_pitch: bool,
    /// Latest platform pose in the fixed frame
    last_pose: Pose3D,
    /// Stamp of the last processed scan
    last_stamp_us: u64,
    stats: ScanOdometryStats,
}

impl<M: ScanMatcher> ScanOdometry<M> {
    /// Build with the prediction chain selected by `config.prediction`.
    pub fn new(
        config: ScanOdometryConfig,
        matcher: M,
        inputs: MotionInputs,
        tf: Arc<dyn TransformService>,
    ) -> Self {
        let predictor = MotionPredictor::from_config(
            &config.prediction,
            &inputs,
            Arc::clone(&tf),
            &config.base_frame,
            &config.fixed_frame,
        );
        log::info!(
            "Scan odometry: matcher={} prediction={:?}",
            matcher.name(),
            predictor.sources()
        );

        Self {
            normalizer: PointSetNormalizer::new(config.normalizer),
            calibration: CalibrationCache::new(&config.base_frame, config.calibration_timeout),
            predictor,
            matcher,
            covariance: CovarianceResolver::new(&config.covariance, config.use_matcher_covariance),
            keyframe_config: config.keyframe,
            keyframe: None,
            inputs,
            tf,
            add_imu_roll_pitch: config.add_imu_roll_pitch,
            last_pose: Pose3D::identity(),
            last_stamp_us: 0,
            stats: ScanOdometryStats::default(),
        }
    }

    /// Replace the prediction chain.
    pub fn with_predictor(mut self, predictor: MotionPredictor) -> Self {
        self.predictor = predictor;
        self
    }

    /// Latest platform pose in the fixed frame.
    pub fn pose(&self) -> &Pose3D {
        &self.last_pose
    }

    pub fn keyframe(&self) -> Option<&KeyframeManager> {
        self.keyframe.as_ref()
    }

    pub fn stats(&self) -> &ScanOdometryStats {
        &self.stats
    }

    pub fn inputs(&self) -> &MotionInputs {
        &self.inputs
    }

    /// Run one cycle on `scan`.
    pub fn process(&mut self, scan: Timestamped<SensorFrame>) -> CycleOutcome {
        let start = Instant::now();
        let stamp_us = scan.timestamp_us;
        let SensorFrame { frame_id, input } = scan.data;

        let calibration = match self.calibration.resolve(self.tf.as_ref(), &frame_id) {
            Ok(calibration) => calibration,
            Err(e) => {
                log::warn!("Skipping scan, sensor mount unknown: {}", e);
                self.stats.scans_skipped += 1;
                return CycleOutcome::Skipped(e);
            }
        };

        let mut current = self.normalizer.normalize(&input);

        if self.keyframe.is_none() {
            // First scan is its own reference
            self.last_stamp_us = stamp_us;
            self.stats.keyframes_created += 1;
        }
        let keyframe = self.keyframe.get_or_insert_with(|| {
            KeyframeManager::new(self.keyframe_config, current.clone(), self.last_pose)
        });
        self.stats.scans_processed += 1;

        keyframe.reference_mut().reset_scratch();
        current.reset_scratch();

        let window = PredictionWindow::new(self.last_stamp_us, stamp_us);
        let predicted_offset = self.predictor.predict(&window);
        let predicted_pose = self.last_pose.compose(&predicted_offset);

        let anchor = *keyframe.anchor();
        let guess = anchor.inverse().compose(&predicted_pose);
        let first_guess = calibration.to_sensor(&guess).to_pose2d();

        let output = self.matcher.match_scans(MatchRequest {
            reference: keyframe.reference_mut(),
            current: &mut current,
            first_guess,
        });

        self.last_stamp_us = stamp_us;

        if !output.valid {
            log::warn!(
                "Scan match failed at {} us after {} iterations",
                stamp_us,
                output.iterations
            );
            self.stats.matches_failed += 1;
            return CycleOutcome::MatchFailed;
        }

        let offset = calibration.to_platform(&Pose3D::from_pose2d(&output.offset));
        let mut pose = anchor.compose(&offset);

        if self.add_imu_roll_pitch
            && let Some(orientation) = self.inputs.latest_orientation()
        {
            let (roll, pitch, _) = orientation.euler_angles();
            let (_, _, yaw) = pose.roll_pitch_yaw();
            pose = pose.with_rotation(quaternion_from_rpy(roll, pitch, yaw));
        }
        self.last_pose = pose;

        let covariance = self.covariance.resolve(output.covariance.as_ref(), &anchor);

        let new_keyframe = keyframe.update(current, &offset, &pose);
        if new_keyframe {
            self.stats.keyframes_created += 1;
        }

        log::debug!(
            "Scan matched in {:.2} ms: iterations={} correspondences={} error={:.6} x={:.3} y={:.3} yaw={:.3}",
            start.elapsed().as_secs_f64() * 1e3,
            output.iterations,
            output.correspondences,
            output.mean_error,
            pose.x(),
            pose.y(),
            pose.yaw()
        );

        CycleOutcome::Estimated(PoseEstimate {
            pose,
            covariance,
            stamp_us,
            new_keyframe,
        })
    }
}
