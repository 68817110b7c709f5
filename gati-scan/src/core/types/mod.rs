//! Core data types.
//!
//! - [`Point2D`], [`Pose2D`]: planar geometry
//! - [`Pose3D`]: full rigid transform for fixed-frame tracking
//! - [`Timestamped<T>`]: generic timestamp wrapper
//! - [`Twist2D`], [`PoseCovariance`]: motion and uncertainty
//! - [`LaserScan`], [`PointCloud`]: raw sensor inputs
//! - [`NormalizedPointSet`]: polar point set consumed by scan matchers

mod odometry;
mod point_set;
mod pose;
mod scan;
mod timestamped;
mod transform;

pub use odometry::{PoseCovariance, Twist2D};
pub use point_set::{INVALID_RANGE, NormalizedPointSet, PointReading, ScratchPoses};
pub use pose::{Point2D, Pose2D};
pub use scan::{LaserScan, PointCloud, ScanInput};
pub use timestamped::Timestamped;
pub use transform::{Pose3D, quaternion_from_rpy};
