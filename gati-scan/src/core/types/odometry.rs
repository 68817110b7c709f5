//! Motion and uncertainty types.

use nalgebra::{Matrix2, Matrix3};
use serde::{Deserialize, Serialize};

/// Planar velocity in the platform frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist2D {
    /// Forward velocity in m/s
    pub vx: f64,
    /// Lateral velocity in m/s
    pub vy: f64,
    /// Angular velocity in rad/s
    pub wz: f64,
}

impl Twist2D {
    pub fn new(vx: f64, vy: f64, wz: f64) -> Self {
        Self { vx, vy, wz }
    }
}

/// Uncertainty of a planar pose estimate.
///
/// Holds the x/y block and the yaw variance; every other term of the full
/// 6×6 pose covariance is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseCovariance {
    /// Row-major `[xx, xy, yx, yy]`
    pub xy: [f64; 4],
    /// Yaw variance
    pub yaw: f64,
}

impl PoseCovariance {
    /// Diagonal covariance from position and yaw variances.
    pub fn diagonal(xx: f64, yy: f64, yaw: f64) -> Self {
        Self {
            xy: [xx, 0.0, 0.0, yy],
            yaw,
        }
    }

    /// Take the x/y block and yaw variance of a 3×3 `(x, y, theta)` covariance.
    pub fn from_matrix3(m: &Matrix3<f64>) -> Self {
        Self {
            xy: [m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]],
            yaw: m[(2, 2)],
        }
    }

    /// The x/y block as a matrix.
    pub fn xy_block(&self) -> Matrix2<f64> {
        Matrix2::new(self.xy[0], self.xy[1], self.xy[2], self.xy[3])
    }

    /// Rotate the x/y block by `angle`: `R · Σxy · Rᵗ`.
    pub fn rotated(&self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let r = Matrix2::new(c, -s, s, c);
        let rotated = r * self.xy_block() * r.transpose();
        Self {
            xy: [
                rotated[(0, 0)],
                rotated[(0, 1)],
                rotated[(1, 0)],
                rotated[(1, 1)],
            ],
            yaw: self.yaw,
        }
    }

    /// 6×6 row-major layout over `(x, y, z, roll, pitch, yaw)`.
    pub fn to_row_major_6x6(&self) -> [f64; 36] {
        let mut out = [0.0; 36];
        out[0] = self.xy[0];
        out[1] = self.xy[1];
        out[6] = self.xy[2];
        out[7] = self.xy[3];
        out[35] = self.yaw;
        out
    }
}

impl Default for PoseCovariance {
    fn default() -> Self {
        Self::diagonal(0.0, 0.0, 0.0)
    }
}
