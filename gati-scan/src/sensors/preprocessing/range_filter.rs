//! Range gating for polar readings.

/// Open range interval `(min_range, max_range)`.
///
/// A reading is accepted only when it lies strictly inside the interval;
/// NaN never passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFilter {
    pub min_range: f64,
    pub max_range: f64,
}

impl RangeFilter {
    /// Create a new range gate.
    pub fn new(min_range: f64, max_range: f64) -> Self {
        Self {
            min_range,
            max_range,
        }
    }

    /// Check if a range value is valid.
    #[inline]
    pub fn is_valid(&self, range: f64) -> bool {
        range > self.min_range && range < self.max_range
    }
}
