//! 2D line fitting used for surface orientation.

use crate::core::types::Point2D;

/// A line in 2D space represented as ax + by + c = 0.
///
/// Normalized so that a² + b² = 1.
#[derive(Debug, Clone, Copy)]
pub struct Line2D {
    /// Normal vector x component
    pub a: f64,
    /// Normal vector y component
    pub b: f64,
    /// Offset along the normal
    pub c: f64,
    /// Fit quality (1 - λmin/λmax, 0-1)
    pub quality: f64,
}

impl Line2D {
    /// Fit a line through a set of points using total least squares.
    ///
    /// Returns None for fewer than 2 points or coincident points.
    pub fn fit(points: &[Point2D]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let n = points.len() as f64;
        let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
        let cy = points.iter().map(|p| p.y).sum::<f64>() / n;

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in points {
            let dx = p.x - cx;
            let dy = p.y - cy;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }

        // Eigenvalues of the 2x2 scatter matrix give the fit quality
        let trace = sxx + syy;
        let det = sxx * syy - sxy * sxy;
        let sqrt_disc = (trace * trace / 4.0 - det).max(0.0).sqrt();
        let lambda1 = trace / 2.0 + sqrt_disc;
        let lambda2 = trace / 2.0 - sqrt_disc;

        if lambda1 <= 1e-18 {
            return None;
        }
        let quality = (1.0 - lambda2 / lambda1).clamp(0.0, 1.0);

        // Principal axis angle; the normal is perpendicular to it
        let direction = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        let (a, b) = (-direction.sin(), direction.cos());
        let c = -(a * cx + b * cy);

        Some(Self { a, b, c, quality })
    }

    /// Signed distance from a point to the line.
    #[inline]
    pub fn distance(&self, p: &Point2D) -> f64 {
        self.a * p.x + self.b * p.y + self.c
    }

    /// Angle of the normal, flipped to face the origin.
    ///
    /// For a sensor at the origin this is the direction a surface "looks".
    pub fn normal_towards_origin(&self) -> f64 {
        // Origin lies on the negative side when c < 0
        if self.c > 0.0 {
            self.b.atan2(self.a)
        } else {
            (-self.b).atan2(-self.a)
        }
    }
}
