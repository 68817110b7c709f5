//! GatiScan - Keyframe-based laser scan odometry
//!
//! Estimates the planar pose of a moving platform by matching each laser
//! scan against a keyframe scan, seeded by whatever motion priors are
//! available (frame tree, inertial orientation, wheel odometry, velocity).
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 main / threads/                     │  ← Entry point, workers
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │          (transform tree, publish, replay)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │     (scan odometry, keyframes, covariance)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │               (point-to-line ICP)                   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   sensors/                          │  ← Sensor processing
//! │     (normalization, motion prediction, mount)       │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gati_scan::{MatcherConfig, MotionInputs, PointToLineIcp, ScanOdometry, TransformBuffer};
//!
//! let tf = Arc::new(TransformBuffer::new());
//! let config = gati_scan::NodeConfig::default();
//! let mut odometry = ScanOdometry::new(
//!     config.scan_odometry(),
//!     PointToLineIcp::new(config.matcher.clone()),
//!     MotionInputs::new(config.prediction.velocity_format()),
//!     tf,
//! );
//!
//! // For each scan
//! if let CycleOutcome::Estimated(estimate) = odometry.process(scan) {
//!     println!("Pose: {:?}", estimate.pose);
//! }
//! ```

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Sensor processing (depends on core)
// ============================================================================
pub mod sensors;

// ============================================================================
// Layer 3: Algorithms (depends on core)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 4: Scan odometry engine (depends on core, sensors, algorithms)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 5: I/O infrastructure
// ============================================================================
pub mod io;

// ============================================================================
// Layer 6: Threading
// ============================================================================
pub mod state;
pub mod threads;

pub mod config;
pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use core::math;
pub use core::types::{
    LaserScan, NormalizedPointSet, Point2D, PointCloud, Pose2D, Pose3D, PoseCovariance, ScanInput,
    Timestamped, Twist2D,
};

// Sensors
pub use sensors::calibration::{CalibrationCache, FrameCalibration};
pub use sensors::motion::{MotionInputs, MotionPredictor, PredictionConfig, VelocityFormat};
pub use sensors::preprocessing::{NormalizerConfig, PointSetNormalizer};

// Algorithms - Matching
pub use algorithms::matching::{MatchOutput, MatchRequest, MatcherConfig, PointToLineIcp, ScanMatcher};

// Engine
pub use engine::scan_odometry::{
    CycleOutcome, KeyframeConfig, KeyframeManager, PoseEstimate, ScanOdometry, ScanOdometryConfig,
    SensorFrame,
};

// I/O
pub use io::publish::{ChannelSink, JsonLinesSink, OutputMessage, PosePublisher, PoseSink};
pub use io::transform::{TransformBuffer, TransformService};

pub use config::NodeConfig;
pub use error::{GatiError, Result, TransformError};
