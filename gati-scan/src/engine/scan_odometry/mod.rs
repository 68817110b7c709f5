//! Keyframe-based laser scan odometry.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SCAN ODOMETRY                           │
//! │                                                               │
//! │  Scan/Cloud → Normalize ──────────────┐                      │
//! │                                        ▼                      │
//! │  Mount (once) ──▶ Motion Prediction ─▶ First Guess            │
//! │                                        │                      │
//! │                                        ▼                      │
//! │                        Match against Keyframe                 │
//! │                                        │                      │
//! │                  ┌─────────────────────┴───────────┐          │
//! │                  ▼                                 ▼          │
//! │          Pose + Covariance                 Keyframe Test      │
//! │                  │                        (adopt or drop)     │
//! └──────────────────┼────────────────────────────────────────────┘
//!                    ▼
//!               Publish sink
//! ```
//!
//! # Components
//!
//! - [`KeyframeManager`]: Owns the reference scan and decides when to replace it
//! - [`CovarianceResolver`]: Matcher covariance or the static fallback
//! - [`ScanOdometry`]: Per-scan driver tying everything together

mod covariance;
mod keyframe;
mod orchestrator;

pub use covariance::{CovarianceConfig, CovarianceResolver};
pub use keyframe::{KeyframeConfig, KeyframeManager};
pub use orchestrator::{
    CycleOutcome, PoseEstimate, ScanOdometry, ScanOdometryConfig, ScanOdometryStats, SensorFrame,
};
