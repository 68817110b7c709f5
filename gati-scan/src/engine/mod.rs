//! Orchestration layer.
//!
//! # Contents
//!
//! - [`scan_odometry`]: Keyframe scan odometry, from raw scan to published pose

pub mod scan_odometry;
