//! Resolution-based downsampling for point clouds.
//!
//! Greedy and sequential: a point is kept only when it lies farther than
//! `resolution` from the last kept finite point. The first finite point is
//! always kept. Non-finite points pass through untouched so the normalizer
//! can mark them invalid; they never become the reference for distances.
//! Density is bounded along the sweep, not globally.

use crate::core::types::Point2D;

/// Greedy sequential downsampler.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionDownsampler {
    resolution_sq: f64,
}

impl ResolutionDownsampler {
    /// Create a new downsampler with the given resolution in meters.
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution_sq: resolution * resolution,
        }
    }

    /// Return the kept points in input order.
    pub fn apply(&self, points: &[Point2D]) -> Vec<Point2D> {
        let mut kept: Vec<Point2D> = Vec::with_capacity(points.len());
        let mut last: Option<Point2D> = None;
        for p in points {
            if !(p.x.is_finite() && p.y.is_finite()) {
                kept.push(*p);
                continue;
            }
            match last {
                Some(l) if l.distance_squared(p) <= self.resolution_sq => {}
                _ => {
                    kept.push(*p);
                    last = Some(*p);
                }
            }
        }
        kept
    }
}
