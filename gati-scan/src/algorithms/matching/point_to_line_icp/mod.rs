//! Point-to-Line Iterative Closest Point (PL-ICP).
//!
//! Matches points of the current scan to segments between adjacent points
//! of the reference scan, which converges much faster than point-to-point
//! ICP in structured environments with walls and straight edges.
//!
//! # Algorithm
//!
//! 1. Split both scans into clusters and estimate surface orientation
//! 2. For each current point, find the nearest reference point and its best
//!    adjacent neighbour in the same cluster
//! 3. Filter (visibility, orientation, doubles, outliers) and weight
//! 4. Gauss-Newton step on the point-to-line residuals
//! 5. Iterate until the step drops below the epsilons
//!
//! # References
//!
//! - Censi, A. "An ICP variant using a point-to-line metric"

mod correspondence;
mod gauss_newton;
mod line2d;
mod surface;

use nalgebra::Matrix3;

use super::{MatchOutput, MatchRequest, MatcherConfig, ScanMatcher};
use crate::core::math::angle_diff;
use crate::core::types::Pose2D;
use correspondence::{Correspondence, NeighbourSearch, SearchStats, find_correspondences_into};
use surface::Surface;

/// Fewer correspondences than this make a match invalid.
const MIN_CORRESPONDENCES: usize = 10;

/// Outcome of one ICP run from a single starting estimate.
#[derive(Debug, Clone, Copy)]
struct IcpRun {
    estimate: Pose2D,
    valid: bool,
    iterations: u32,
    correspondences: usize,
    mean_error: f64,
    hessian: Option<Matrix3<f64>>,
}

impl IcpRun {
    fn failed(estimate: Pose2D, iterations: u32) -> Self {
        Self {
            estimate,
            valid: false,
            iterations,
            correspondences: 0,
            mean_error: f64::MAX,
            hessian: None,
        }
    }
}

/// Geometry shared by every run of one match call.
struct MatchContext<'a> {
    reference: &'a Surface,
    current: &'a Surface,
    search: &'a NeighbourSearch,
    fov: (f64, f64),
    first_guess: Pose2D,
}

/// Point-to-Line ICP scan matcher.
#[derive(Debug)]
pub struct PointToLineIcp {
    config: MatcherConfig,
    /// Preallocated buffer for correspondences (reused across iterations).
    correspondence_buffer: Vec<Correspondence>,
}

impl PointToLineIcp {
    /// Create a new Point-to-Line ICP matcher.
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            correspondence_buffer: Vec::with_capacity(512),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// True when `estimate` stays within the allowed correction of the first guess.
    fn within_correction(&self, first_guess: &Pose2D, estimate: &Pose2D) -> bool {
        let dx = estimate.x - first_guess.x;
        let dy = estimate.y - first_guess.y;
        dx.hypot(dy) <= self.config.max_linear_correction
            && angle_diff(first_guess.theta, estimate.theta).abs()
                <= self.config.max_angular_correction()
    }

    /// Iterate from `start` until convergence or `max_iterations`.
    fn run(&mut self, ctx: &MatchContext<'_>, start: Pose2D) -> IcpRun {
        let config = self.config.clone();
        let mut corr = std::mem::take(&mut self.correspondence_buffer);
        let mut stats = SearchStats::default();
        let mut x = start;
        let mut iterations = 0u32;
        let mut converged = false;

        while iterations < config.max_iterations {
            iterations += 1;

            find_correspondences_into(
                &config,
                ctx.reference,
                ctx.current,
                ctx.search,
                &x,
                ctx.fov,
                &mut corr,
                &mut stats,
            );
            if corr.len() < MIN_CORRESPONDENCES {
                log::debug!(
                    "PL-ICP: only {} correspondences at iteration {}",
                    corr.len(),
                    iterations
                );
                self.correspondence_buffer = corr;
                return IcpRun::failed(x, iterations);
            }

            let equations = gauss_newton::accumulate(
                ctx.reference,
                ctx.current,
                &corr,
                &x,
                config.use_point_to_line_distance,
            );
            let Some(delta) = equations.step() else {
                log::debug!("PL-ICP: degenerate geometry at iteration {}", iterations);
                self.correspondence_buffer = corr;
                return IcpRun::failed(x, iterations);
            };

            x = Pose2D::new(x.x + delta[0], x.y + delta[1], x.theta + delta[2]);

            if !self.within_correction(&ctx.first_guess, &x) {
                log::debug!(
                    "PL-ICP: correction limit exceeded ({:.3}, {:.3}, {:.3})",
                    x.x - ctx.first_guess.x,
                    x.y - ctx.first_guess.y,
                    angle_diff(ctx.first_guess.theta, x.theta)
                );
                self.correspondence_buffer = corr;
                return IcpRun::failed(x, iterations);
            }

            if delta[0].hypot(delta[1]) < config.epsilon_xy && delta[2].abs() < config.epsilon_theta {
                converged = true;
                break;
            }
        }

        if !converged {
            log::debug!("PL-ICP: reached {} iterations without converging", iterations);
        }

        // Residual and information at the final estimate
        find_correspondences_into(
            &config,
            ctx.reference,
            ctx.current,
            ctx.search,
            &x,
            ctx.fov,
            &mut corr,
            &mut stats,
        );
        let equations = gauss_newton::accumulate(
            ctx.reference,
            ctx.current,
            &corr,
            &x,
            config.use_point_to_line_distance,
        );
        let run = IcpRun {
            estimate: x,
            valid: corr.len() >= MIN_CORRESPONDENCES,
            iterations,
            correspondences: corr.len(),
            mean_error: equations.mean_error,
            hessian: Some(equations.hessian),
        };

        if stats.verify_mismatches > 0 {
            log::warn!(
                "PL-ICP: k-d tree disagreed with linear search {} times",
                stats.verify_mismatches
            );
        }
        log::trace!(
            "PL-ICP: rejected visibility={} alpha={} outliers={}",
            stats.rejected_visibility,
            stats.rejected_alpha,
            stats.rejected_outliers
        );

        self.correspondence_buffer = corr;
        run
    }

    /// Retry from perturbed estimates, keeping the lowest residual.
    fn restart(&mut self, ctx: &MatchContext<'_>, best: IcpRun) -> IcpRun {
        let dt = self.config.restart_dt;
        let dtheta = self.config.restart_dtheta;
        let perturbations = [
            Pose2D::new(dt, 0.0, 0.0),
            Pose2D::new(-dt, 0.0, 0.0),
            Pose2D::new(0.0, dt, 0.0),
            Pose2D::new(0.0, -dt, 0.0),
            Pose2D::new(0.0, 0.0, dtheta),
            Pose2D::new(0.0, 0.0, -dtheta),
        ];

        let mut best = best;
        for perturbation in perturbations {
            let start = best.estimate.compose(&perturbation);
            let candidate = self.run(ctx, start);
            if candidate.valid && candidate.mean_error < best.mean_error {
                log::debug!(
                    "PL-ICP: restart improved mean error {:.6} -> {:.6}",
                    best.mean_error,
                    candidate.mean_error
                );
                best = candidate;
            }
            if best.mean_error <= self.config.restart_threshold_mean_error {
                break;
            }
        }
        best
    }

    fn covariance(&self, hessian: &Matrix3<f64>) -> Option<Matrix3<f64>> {
        let inverse = hessian.try_inverse()?;
        // Sigma weights already fold 1/σ² into the information
        let scale = if self.config.use_sigma_weights {
            1.0
        } else {
            self.config.sigma * self.config.sigma
        };
        Some(inverse * scale)
    }
}

impl ScanMatcher for PointToLineIcp {
    fn name(&self) -> &'static str {
        "pl-icp"
    }

    fn match_scans(&mut self, request: MatchRequest<'_>) -> MatchOutput {
        let MatchRequest {
            reference,
            current,
            first_guess,
        } = request;

        current.scratch.odometry = first_guess.to_array();

        let ref_surface = Surface::build(
            reference,
            self.config.clustering_threshold,
            self.config.orientation_neighbourhood,
        );
        let cur_surface = Surface::build(
            current,
            self.config.clustering_threshold,
            self.config.orientation_neighbourhood,
        );

        if ref_surface.len() < MIN_CORRESPONDENCES || cur_surface.len() < MIN_CORRESPONDENCES {
            log::debug!(
                "PL-ICP: not enough valid points (reference {}, current {})",
                ref_surface.len(),
                cur_surface.len()
            );
            return MatchOutput::invalid(first_guess);
        }

        let search = NeighbourSearch::build(&ref_surface, self.config.use_corr_tricks);
        let ctx = MatchContext {
            reference: &ref_surface,
            current: &cur_surface,
            search: &search,
            fov: (current.min_angle, current.max_angle),
            first_guess,
        };

        let mut result = self.run(&ctx, first_guess);
        if self.config.restart
            && result.valid
            && result.mean_error > self.config.restart_threshold_mean_error
        {
            result = self.restart(&ctx, result);
        }

        if !result.valid {
            return MatchOutput {
                iterations: result.iterations,
                ..MatchOutput::invalid(first_guess)
            };
        }

        current.scratch.estimate = result.estimate.to_array();

        let covariance = if self.config.do_compute_covariance {
            result.hessian.as_ref().and_then(|h| self.covariance(h))
        } else {
            None
        };

        MatchOutput {
            valid: true,
            offset: result.estimate,
            covariance,
            iterations: result.iterations,
            correspondences: result.correspondences,
            mean_error: result.mean_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NormalizedPointSet;
    use approx::assert_relative_eq;

    /// Range from `(x, y, heading)` along `bearing` to a skewed quadrilateral room.
    fn raycast(x: f64, y: f64, heading: f64, bearing: f64) -> f64 {
        let corners = [(-2.1, -1.6), (3.3, -2.2), (2.7, 2.4), (-1.8, 1.9)];
        let (dx, dy) = ((heading + bearing).cos(), (heading + bearing).sin());
        let mut best = f64::MAX;
        for i in 0..corners.len() {
            let (ax, ay) = corners[i];
            let (bx, by) = corners[(i + 1) % corners.len()];
            let (ex, ey) = (bx - ax, by - ay);
            let denom = dx * ey - dy * ex;
            if denom.abs() < 1e-12 {
                continue;
            }
            let t = ((ax - x) * ey - (ay - y) * ex) / denom;
            let u = ((ax - x) * dy - (ay - y) * dx) / denom;
            if t > 0.0 && (0.0..=1.0).contains(&u) {
                best = best.min(t);
            }
        }
        best
    }

    fn scan_from(x: f64, y: f64, heading: f64) -> NormalizedPointSet {
        let mut set = NormalizedPointSet::with_capacity(360);
        for i in 0..360 {
            let bearing = -std::f64::consts::PI + (i as f64).to_radians();
            let r = raycast(x, y, heading, bearing);
            set.push(bearing, r, r > 0.05 && r < 20.0);
        }
        set.update_span();
        set
    }

    fn icp(config: MatcherConfig) -> PointToLineIcp {
        PointToLineIcp::new(config)
    }

    #[test]
    fn test_identity() {
        let mut reference = scan_from(0.0, 0.0, 0.0);
        let mut current = scan_from(0.0, 0.0, 0.0);
        let out = icp(MatcherConfig::default()).match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::identity(),
        });

        assert!(out.valid);
        assert_relative_eq!(out.offset.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(out.offset.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(out.offset.theta, 0.0, epsilon = 1e-6);
        assert!(out.covariance.is_none());
    }

    #[test]
    fn test_small_translation() {
        let mut reference = scan_from(0.0, 0.0, 0.0);
        let mut current = scan_from(0.08, -0.05, 0.0);
        let out = icp(MatcherConfig {
            max_iterations: 40,
            ..MatcherConfig::default()
        })
        .match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::identity(),
        });

        assert!(out.valid);
        assert_relative_eq!(out.offset.x, 0.08, epsilon = 5e-3);
        assert_relative_eq!(out.offset.y, -0.05, epsilon = 5e-3);
        assert_relative_eq!(out.offset.theta, 0.0, epsilon = 5e-3);
        assert_relative_eq!(current.scratch.estimate[0], out.offset.x);
    }

    #[test]
    fn test_small_rotation_linear_search() {
        let mut reference = scan_from(0.0, 0.0, 0.0);
        let mut current = scan_from(0.0, 0.0, 0.05);
        let out = icp(MatcherConfig {
            max_iterations: 40,
            use_corr_tricks: false,
            ..MatcherConfig::default()
        })
        .match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::identity(),
        });

        assert!(out.valid);
        assert_relative_eq!(out.offset.theta, 0.05, epsilon = 2e-3);
    }

    #[test]
    fn test_covariance_when_enabled() {
        let mut reference = scan_from(0.0, 0.0, 0.0);
        let mut current = scan_from(0.02, 0.0, 0.0);
        let out = icp(MatcherConfig {
            do_compute_covariance: true,
            max_iterations: 40,
            ..MatcherConfig::default()
        })
        .match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::identity(),
        });

        let cov = out.covariance.expect("covariance requested");
        assert!(cov[(0, 0)] > 0.0 && cov[(1, 1)] > 0.0 && cov[(2, 2)] > 0.0);
        assert_relative_eq!(cov[(0, 1)], cov[(1, 0)], epsilon = 1e-12, max_relative = 1e-6);
    }

    #[test]
    fn test_correction_limit() {
        let mut reference = scan_from(0.0, 0.0, 0.0);
        let mut current = scan_from(0.25, 0.0, 0.0);
        let out = icp(MatcherConfig {
            max_linear_correction: 0.05,
            max_correspondence_dist: 0.5,
            max_iterations: 40,
            ..MatcherConfig::default()
        })
        .match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::identity(),
        });
        assert!(!out.valid);
    }

    #[test]
    fn test_sparse_input_invalid() {
        let mut reference = NormalizedPointSet::default();
        let mut current = scan_from(0.0, 0.0, 0.0);
        let out = icp(MatcherConfig::default()).match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::new(0.1, 0.0, 0.0),
        });
        assert!(!out.valid);
        assert_relative_eq!(current.scratch.odometry[0], 0.1);
    }

    #[test]
    fn test_filters_enabled_still_converge() {
        let mut reference = scan_from(0.0, 0.0, 0.0);
        let mut current = scan_from(0.03, 0.02, 0.02);
        let out = icp(MatcherConfig {
            max_iterations: 40,
            do_alpha_test: true,
            do_visibility_test: true,
            use_ml_weights: true,
            use_sigma_weights: true,
            debug_verify_tricks: true,
            restart: true,
            ..MatcherConfig::default()
        })
        .match_scans(MatchRequest {
            reference: &mut reference,
            current: &mut current,
            first_guess: Pose2D::identity(),
        });

        assert!(out.valid);
        assert_relative_eq!(out.offset.x, 0.03, epsilon = 5e-3);
        assert_relative_eq!(out.offset.y, 0.02, epsilon = 5e-3);
        assert_relative_eq!(out.offset.theta, 0.02, epsilon = 2e-3);
    }
}
