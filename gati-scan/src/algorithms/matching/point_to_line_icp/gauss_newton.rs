//! Gauss-Newton step for point-to-line and point-to-point ICP.
//!
//! Parameters are the absolute `(tx, ty, θ)` of the current scan in the
//! reference frame, so a step is applied additively:
//!
//! ```text
//! p' = R(θ)·p + t
//! point-to-line:  r = n · (p' - q1)          J = [nx, ny, n · R'(θ)·p]
//! point-to-point: r = p' - q1                J = [I₂ | R'(θ)·p]
//! ```

use nalgebra::{Matrix3, Vector3};

use super::correspondence::Correspondence;
use super::surface::Surface;
use crate::core::types::Pose2D;

/// Normal equations accumulated over one correspondence set.
#[derive(Debug, Clone, Copy)]
pub struct NormalEquations {
    /// Σ w·JᵀJ
    pub hessian: Matrix3<f64>,
    /// Σ w·Jᵀr
    pub gradient: Vector3<f64>,
    /// Σ r² / n (unweighted)
    pub mean_error: f64,
}

impl NormalEquations {
    /// Solve for the step `δ = -H⁻¹·g`.
    pub fn step(&self) -> Option<Vector3<f64>> {
        let inverse = self.hessian.try_inverse()?;
        let delta = -(inverse * self.gradient);
        delta.iter().all(|v| v.is_finite()).then_some(delta)
    }
}

/// Accumulate the normal equations at `estimate`.
pub fn accumulate(
    reference: &Surface,
    current: &Surface,
    correspondences: &[Correspondence],
    estimate: &Pose2D,
    point_to_line: bool,
) -> NormalEquations {
    let (sin_t, cos_t) = estimate.theta.sin_cos();
    let mut hessian = Matrix3::zeros();
    let mut gradient = Vector3::zeros();
    let mut sum_sq = 0.0;

    for corr in correspondences {
        let p = current.points[corr.cur];
        let q = reference.points[corr.j1];
        let pw = estimate.transform_point(&p);

        // ∂p'/∂θ
        let drx = -sin_t * p.x - cos_t * p.y;
        let dry = cos_t * p.x - sin_t * p.y;

        if point_to_line {
            let [nx, ny] = corr.normal;
            let r = nx * (pw.x - q.x) + ny * (pw.y - q.y);
            let j = Vector3::new(nx, ny, nx * drx + ny * dry);
            hessian += corr.weight * j * j.transpose();
            gradient += corr.weight * r * j;
            sum_sq += r * r;
        } else {
            let (rx, ry) = (pw.x - q.x, pw.y - q.y);
            let jx = Vector3::new(1.0, 0.0, drx);
            let jy = Vector3::new(0.0, 1.0, dry);
            hessian += corr.weight * (jx * jx.transpose() + jy * jy.transpose());
            gradient += corr.weight * (rx * jx + ry * jy);
            sum_sq += rx * rx + ry * ry;
        }
    }

    let mean_error = if correspondences.is_empty() {
        f64::MAX
    } else {
        sum_sq / correspondences.len() as f64
    };

    NormalEquations {
        hessian,
        gradient,
        mean_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NormalizedPointSet, Point2D};
    use approx::assert_relative_eq;

    fn corner() -> Surface {
        // Two perpendicular slanted walls, one point each side of the corner
        let mut surface = Surface::default();
        let (s, c) = 0.3f64.sin_cos();
        for i in 0..20 {
            let t = i as f64 * 0.1;
            surface.points.push(Point2D::new(1.0 + t * c, 1.0 + t * s));
            surface.points.push(Point2D::new(1.0 - t * s, 1.0 + t * c));
        }
        surface
    }

    #[test]
    fn test_single_step_recovers_translation() {
        let reference = corner();
        let mut current = Surface::default();
        let shift = Pose2D::new(0.02, -0.01, 0.0);
        // Current points are reference points seen from a shifted sensor
        for q in &reference.points {
            current.points.push(shift.inverse().transform_point(q));
        }
        let (s, c) = 0.3f64.sin_cos();
        let correspondences: Vec<Correspondence> = (0..reference.points.len())
            .map(|i| Correspondence {
                cur: i,
                j1: i,
                j2: None,
                normal: if i % 2 == 0 { [-s, c] } else { [-c, -s] },
                error: 0.0,
                weight: 1.0,
            })
            .collect();

        let eq = accumulate(&reference, &current, &correspondences, &Pose2D::identity(), true);
        let delta = eq.step().unwrap();
        assert_relative_eq!(delta[0], 0.02, epsilon = 1e-9);
        assert_relative_eq!(delta[1], -0.01, epsilon = 1e-9);
        assert_relative_eq!(delta[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_point_to_point_zero_residual() {
        let mut set = NormalizedPointSet::default();
        for i in 0..30 {
            set.push(0.1 * i as f64, 2.0 + 0.05 * i as f64, true);
        }
        let surface = Surface::build(&mut set, 10.0, 3);
        let correspondences: Vec<Correspondence> = (0..surface.len())
            .map(|i| Correspondence {
                cur: i,
                j1: i,
                j2: None,
                normal: [0.0, 0.0],
                error: 0.0,
                weight: 1.0,
            })
            .collect();
        let eq = accumulate(&surface, &surface, &correspondences, &Pose2D::identity(), false);
        assert_relative_eq!(eq.mean_error, 0.0);
        let delta = eq.step().unwrap();
        assert_relative_eq!(delta.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_system_has_no_step() {
        let eq = NormalEquations {
            hessian: Matrix3::zeros(),
            gradient: Vector3::zeros(),
            mean_error: 0.0,
        };
        assert!(eq.step().is_none());
    }
}
