//! Scan matcher configuration.

use serde::{Deserialize, Serialize};

/// Options recognized by scan matchers.
///
/// Defaults follow common PL-ICP settings for indoor 2D lidars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum rotation the matcher may add to the first guess (degrees).
    pub max_angular_correction_deg: f64,

    /// Maximum translation the matcher may add to the first guess (meters).
    pub max_linear_correction: f64,

    /// Maximum number of iterations.
    pub max_iterations: u32,

    /// Convergence threshold for translation (meters).
    pub epsilon_xy: f64,

    /// Convergence threshold for rotation (radians).
    pub epsilon_theta: f64,

    /// Maximum distance for a correspondence to be valid (meters).
    pub max_correspondence_dist: f64,

    /// Noise on range readings (meters), used for weights and covariance.
    pub sigma: f64,

    /// Use a k-d tree for the correspondence search instead of a linear scan.
    pub use_corr_tricks: bool,

    /// Restart from perturbed estimates when the residual stays high.
    pub restart: bool,

    /// Mean squared residual above which a restart is attempted.
    pub restart_threshold_mean_error: f64,

    /// Translation perturbation for restarts (meters).
    pub restart_dt: f64,

    /// Rotation perturbation for restarts (radians).
    pub restart_dtheta: f64,

    /// Consecutive points farther apart than this start a new cluster (meters).
    pub clustering_threshold: f64,

    /// Neighbours on each side used to estimate surface orientation.
    pub orientation_neighbourhood: usize,

    /// Point-to-line metric; point-to-point when false.
    pub use_point_to_line_distance: bool,

    /// Reject correspondences whose surface orientations disagree.
    pub do_alpha_test: bool,

    /// Orientation disagreement limit for the alpha test (degrees).
    pub do_alpha_test_threshold_deg: f64,

    /// Fraction of correspondences kept after sorting by residual.
    pub outliers_max_perc: f64,

    /// Order statistic for the adaptive outlier threshold (0..1).
    pub outliers_adaptive_order: f64,

    /// Multiplier applied to the adaptive order statistic.
    pub outliers_adaptive_mult: f64,

    /// Drop reference points that cannot be seen from the current pose.
    pub do_visibility_test: bool,

    /// Keep only the best current point per reference point.
    pub outliers_remove_doubles: bool,

    /// Estimate the covariance of the result.
    pub do_compute_covariance: bool,

    /// Cross-check the k-d tree search against the linear scan.
    pub debug_verify_tricks: bool,

    /// Weight correspondences by beam incidence angle.
    pub use_ml_weights: bool,

    /// Weight correspondences by the range noise `sigma`.
    pub use_sigma_weights: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_angular_correction_deg: 45.0,
            max_linear_correction: 0.5,
            max_iterations: 10,
            epsilon_xy: 1e-6,
            epsilon_theta: 1e-6,
            max_correspondence_dist: 0.3,
            sigma: 0.01,
            use_corr_tricks: true,
            restart: false,
            restart_threshold_mean_error: 0.01,
            restart_dt: 1.0,
            restart_dtheta: 0.1,
            clustering_threshold: 0.25,
            orientation_neighbourhood: 20,
            use_point_to_line_distance: true,
            do_alpha_test: false,
            do_alpha_test_threshold_deg: 20.0,
            outliers_max_perc: 0.90,
            outliers_adaptive_order: 0.7,
            outliers_adaptive_mult: 2.0,
            do_visibility_test: false,
            outliers_remove_doubles: true,
            do_compute_covariance: false,
            debug_verify_tricks: false,
            use_ml_weights: false,
            use_sigma_weights: false,
        }
    }
}

impl MatcherConfig {
    pub fn max_angular_correction(&self) -> f64 {
        self.max_angular_correction_deg.to_radians()
    }

    pub fn alpha_test_threshold(&self) -> f64 {
        self.do_alpha_test_threshold_deg.to_radians()
    }
}
