//! Microsecond-stamped values.

use serde::{Deserialize, Serialize};

use crate::core::math::elapsed_seconds;

/// A value paired with the instant it refers to.
///
/// Stamps are microseconds on the clock of the producing sensor; only
/// differences between stamps from the same session are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub data: T,
    pub timestamp_us: u64,
}

impl<T> Timestamped<T> {
    #[inline]
    pub fn new(data: T, timestamp_us: u64) -> Self {
        Self { data, timestamp_us }
    }

    /// Replace the payload, keeping the stamp.
    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Timestamped<U> {
        Timestamped {
            data: f(self.data),
            timestamp_us: self.timestamp_us,
        }
    }

    #[inline]
    pub fn as_ref(&self) -> Timestamped<&T> {
        Timestamped {
            data: &self.data,
            timestamp_us: self.timestamp_us,
        }
    }

    /// Signed seconds from `earlier_us` to this stamp.
    #[inline]
    pub fn seconds_since(&self, earlier_us: u64) -> f64 {
        elapsed_seconds(earlier_us, self.timestamp_us)
    }
}
