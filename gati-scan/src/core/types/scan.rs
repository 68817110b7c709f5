//! Raw sensor inputs: ranged laser scans and unordered point clouds.

use serde::{Deserialize, Serialize};

use super::pose::Point2D;

/// Raw LiDAR scan in polar coordinates.
///
/// Reading `i` lies at `angle_min + i * angle_increment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    /// Start angle in radians
    pub angle_min: f64,
    /// Angular resolution (radians between consecutive readings)
    pub angle_increment: f64,
    /// Minimum valid range in meters (exclusive)
    pub range_min: f64,
    /// Maximum valid range in meters (exclusive)
    pub range_max: f64,
    /// Range measurements in meters
    pub ranges: Vec<f64>,
}

impl LaserScan {
    /// Create a new laser scan with the given parameters.
    pub fn new(
        angle_min: f64,
        angle_increment: f64,
        range_min: f64,
        range_max: f64,
        ranges: Vec<f64>,
    ) -> Self {
        Self {
            angle_min,
            angle_increment,
            range_min,
            range_max,
            ranges,
        }
    }

    /// Number of range measurements.
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if scan is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Angle of reading `index`.
    #[inline]
    pub fn angle_at(&self, index: usize) -> f64 {
        self.angle_min + index as f64 * self.angle_increment
    }

    /// Angle of the last reading.
    pub fn angle_max(&self) -> f64 {
        self.angle_at(self.len().saturating_sub(1))
    }
}

/// Unordered 2D point cloud in the sensor frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Point2D>,
}

impl PointCloud {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<Point2D> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point2D>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Either raw input modality accepted by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanInput {
    Ranged(LaserScan),
    Cloud(PointCloud),
}

impl ScanInput {
    /// Number of raw readings or points.
    pub fn len(&self) -> usize {
        match self {
            ScanInput::Ranged(scan) => scan.len(),
            ScanInput::Cloud(cloud) => cloud.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_angle_at() {
        let scan = LaserScan::new(-1.0, 0.5, 0.1, 10.0, vec![1.0; 5]);
        assert_relative_eq!(scan.angle_at(0), -1.0);
        assert_relative_eq!(scan.angle_at(4), 1.0);
        assert_relative_eq!(scan.angle_max(), 1.0);
    }

    #[test]
    fn test_cloud_from_iter() {
        let cloud: PointCloud = (0..3).map(|i| Point2D::new(i as f64, 0.0)).collect();
        assert_eq!(cloud.len(), 3);
        assert!(!cloud.is_empty());
    }
}
