//! Mathematical primitives for planar pose arithmetic.
//!
//! Functions for angle normalization and angular arithmetic.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Normalize angle to [-π, π].
///
/// # Example
/// ```
/// use gati_scan::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
/// assert!((normalize_angle(-3.0 * PI) - (-PI)).abs() < 1e-9);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Shortest angular difference from angle `a` to angle `b`.
///
/// Returns the signed angle you need to add to `a` to reach `b`,
/// taking the shortest path around the circle.
///
/// # Example
/// ```
/// use gati_scan::core::math::angle_diff;
/// use std::f64::consts::PI;
///
/// // Crossing the ±π boundary takes the short way
/// let diff = angle_diff(PI - 0.1, -PI + 0.1);
/// assert!((diff - 0.2).abs() < 1e-9);
/// ```
#[inline]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_angle(b - a)
}

/// Convert a microsecond timestamp delta to signed seconds.
#[inline]
pub fn elapsed_seconds(from_us: u64, to_us: u64) -> f64 {
    (to_us as f64 - from_us as f64) * 1e-6
}

/// Convert a timeout in seconds to a [`Duration`].
///
/// `None` for negative, NaN or infinite values, and for values too large
/// to form a deadline from the current instant.
pub fn timeout_from_secs(secs: f64) -> Option<Duration> {
    let timeout = Duration::try_from_secs_f64(secs).ok()?;
    Instant::now().checked_add(timeout)?;
    Some(timeout)
}
