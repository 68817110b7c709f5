//! Normalized point set consumed by scan matchers.
//!
//! Both ranged scans and unordered clouds are reduced to this polar form:
//! an ordered list of `(angle, range, valid)` readings plus the angular span.
//! The three scratch pose triples belong to the matcher call contract and
//! are zeroed with [`NormalizedPointSet::reset_scratch`] before every call.

use super::pose::Point2D;

/// Range assigned to readings that must never be matched.
pub const INVALID_RANGE: f64 = -1.0;

/// One polar reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointReading {
    /// Bearing in the sensor frame (radians)
    pub angle: f64,
    /// Range in meters, [`INVALID_RANGE`] when rejected
    pub range: f64,
    /// Whether the matcher may use this reading
    pub valid: bool,
    /// Cluster tag, `None` until a matcher assigns one
    pub cluster: Option<u32>,
}

impl PointReading {
    /// Cartesian position in the sensor frame.
    #[inline]
    pub fn point(&self) -> Point2D {
        let (s, c) = self.angle.sin_cos();
        Point2D::new(self.range * c, self.range * s)
    }
}

/// Scratch `[x, y, theta]` triples written by a matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScratchPoses {
    pub odometry: [f64; 3],
    pub estimate: [f64; 3],
    pub true_pose: [f64; 3],
}

impl ScratchPoses {
    /// True when all three triples are zero.
    pub fn is_zero(&self) -> bool {
        self.odometry == [0.0; 3] && self.estimate == [0.0; 3] && self.true_pose == [0.0; 3]
    }
}

/// Ordered polar point set with its angular span.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPointSet {
    pub readings: Vec<PointReading>,
    pub min_angle: f64,
    pub max_angle: f64,
    pub scratch: ScratchPoses,
}

impl NormalizedPointSet {
    /// Empty set with room for `n` readings.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            readings: Vec::with_capacity(n),
            ..Self::default()
        }
    }

    /// Append a reading with an unassigned cluster.
    #[inline]
    pub fn push(&mut self, angle: f64, range: f64, valid: bool) {
        self.readings.push(PointReading {
            angle,
            range: if valid { range } else { INVALID_RANGE },
            valid,
            cluster: None,
        });
    }

    /// Number of readings (valid or not).
    #[inline]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of readings flagged valid.
    pub fn valid_count(&self) -> usize {
        self.readings.iter().filter(|r| r.valid).count()
    }

    /// Zero the scratch poses and clear cluster tags.
    pub fn reset_scratch(&mut self) {
        self.scratch = ScratchPoses::default();
        for r in &mut self.readings {
            r.cluster = None;
        }
    }

    /// Recompute `min_angle`/`max_angle` from the first and last reading.
    pub fn update_span(&mut self) {
        self.min_angle = self.readings.first().map_or(0.0, |r| r.angle);
        self.max_angle = self.readings.last().map_or(0.0, |r| r.angle);
    }

    /// True when angles never decrease along the sequence.
    pub fn is_angle_monotonic(&self) -> bool {
        self.readings.windows(2).all(|w| w[0].angle <= w[1].angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_reading_gets_sentinel() {
        let mut set = NormalizedPointSet::with_capacity(2);
        set.push(0.0, 1.5, true);
        set.push(0.1, 99.0, false);
        assert_relative_eq!(set.readings[0].range, 1.5);
        assert_relative_eq!(set.readings[1].range, INVALID_RANGE);
        assert_eq!(set.valid_count(), 1);
    }

    #[test]
    fn test_reset_scratch() {
        let mut set = NormalizedPointSet::with_capacity(1);
        set.push(0.0, 1.0, true);
        set.readings[0].cluster = Some(3);
        set.scratch.estimate = [1.0, 2.0, 3.0];
        set.reset_scratch();
        assert!(set.scratch.is_zero());
        assert_eq!(set.readings[0].cluster, None);
    }

    #[test]
    fn test_span_and_monotonic() {
        let mut set = NormalizedPointSet::default();
        set.push(-0.5, 1.0, true);
        set.push(0.2, 1.0, true);
        set.push(0.1, 1.0, true);
        set.update_span();
        assert_relative_eq!(set.min_angle, -0.5);
        assert_relative_eq!(set.max_angle, 0.1);
        assert!(!set.is_angle_monotonic());
    }

    #[test]
    fn test_reading_point() {
        let r = PointReading {
            angle: std::f64::consts::FRAC_PI_2,
            range: 2.0,
            valid: true,
            cluster: None,
        };
        let p = r.point();
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
    }
}
