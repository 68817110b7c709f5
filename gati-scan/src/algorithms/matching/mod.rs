//! Scan matching module.
//!
//! Aligns a current point set against a reference point set, starting from a
//! first guess of the current sensor pose in the reference sensor frame.
//!
//! # Algorithms
//!
//! - [`PointToLineIcp`]: Point-to-line ICP for structured environments
//!
//! # Example
//!
//! ```ignore
//! use gati_scan::algorithms::matching::{MatchRequest, MatcherConfig, PointToLineIcp, ScanMatcher};
//! use gati_scan::core::types::Pose2D;
//!
//! let mut icp = PointToLineIcp::new(MatcherConfig::default());
//! let output = icp.match_scans(MatchRequest {
//!     reference: &mut reference,
//!     current: &mut current,
//!     first_guess: Pose2D::identity(),
//! });
//! if output.valid {
//!     println!("Offset: {:?}", output.offset);
//! }
//! ```

mod config;
mod point_to_line_icp;

pub use config::MatcherConfig;
pub use point_to_line_icp::PointToLineIcp;

use nalgebra::Matrix3;

use crate::core::types::{NormalizedPointSet, Pose2D};

/// Input to one match call.
///
/// Both sets are borrowed mutably: the matcher tags clusters on them and
/// records the first guess and estimate in their scratch poses.
#[derive(Debug)]
pub struct MatchRequest<'a> {
    pub reference: &'a mut NormalizedPointSet,
    pub current: &'a mut NormalizedPointSet,
    /// Current sensor pose in the reference sensor frame
    pub first_guess: Pose2D,
}

/// Result of a scan matching operation.
#[derive(Debug, Clone)]
pub struct MatchOutput {
    /// Whether the match produced a usable estimate.
    pub valid: bool,

    /// Estimated pose of the current scan in the reference scan frame.
    ///
    /// Equal to the first guess when the match is invalid.
    pub offset: Pose2D,

    /// 3×3 covariance over (x, y, θ), when requested and solvable.
    pub covariance: Option<Matrix3<f64>>,

    /// Number of iterations performed.
    pub iterations: u32,

    /// Correspondences used at the final estimate.
    pub correspondences: usize,

    /// Mean squared residual at the final estimate.
    pub mean_error: f64,
}

impl MatchOutput {
    /// Failed result carrying the first guess.
    pub fn invalid(first_guess: Pose2D) -> Self {
        Self {
            valid: false,
            offset: first_guess,
            covariance: None,
            iterations: 0,
            correspondences: 0,
            mean_error: f64::MAX,
        }
    }
}

/// Trait for scan matching algorithms.
pub trait ScanMatcher: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Align `request.current` to `request.reference`.
    fn match_scans(&mut self, request: MatchRequest<'_>) -> MatchOutput;
}

impl<M: ScanMatcher + ?Sized> ScanMatcher for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn match_scans(&mut self, request: MatchRequest<'_>) -> MatchOutput {
        (**self).match_scans(request)
    }
}
