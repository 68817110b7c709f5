//! Conversion of raw scans and clouds into [`NormalizedPointSet`]s.

use serde::{Deserialize, Serialize};

use super::downsampler::ResolutionDownsampler;
use super::range_filter::RangeFilter;
use crate::core::types::{LaserScan, NormalizedPointSet, PointCloud, ScanInput};

/// Cloud-path parameters. Ranged scans carry their own range limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Minimum accepted cloud range in meters (exclusive)
    pub cloud_range_min: f64,
    /// Maximum accepted cloud range in meters (exclusive)
    pub cloud_range_max: f64,
    /// Downsampling resolution in meters
    pub cloud_resolution: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            cloud_range_min: 0.1,
            cloud_range_max: 50.0,
            cloud_resolution: 0.05,
        }
    }
}

/// Builds normalized point sets from either input modality.
///
/// Cloud input is expected in sensor sweep order. It is not re-sorted;
/// a non-monotonic sweep is reported once with a warning and passed on
/// as is, with the span taken from the first and last kept point.
#[derive(Debug, Clone)]
pub struct PointSetNormalizer {
    cloud_gate: RangeFilter,
    downsampler: ResolutionDownsampler,
    warned_unordered: bool,
}

impl PointSetNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            cloud_gate: RangeFilter::new(config.cloud_range_min, config.cloud_range_max),
            downsampler: ResolutionDownsampler::new(config.cloud_resolution),
            warned_unordered: false,
        }
    }

    /// Normalize either modality.
    pub fn normalize(&mut self, input: &ScanInput) -> NormalizedPointSet {
        match input {
            ScanInput::Ranged(scan) => self.from_scan(scan),
            ScanInput::Cloud(cloud) => self.from_cloud(cloud),
        }
    }

    /// Ranged-beam path: one reading per beam, angle `start + i * increment`.
    pub fn from_scan(&self, scan: &LaserScan) -> NormalizedPointSet {
        let gate = RangeFilter::new(scan.range_min, scan.range_max);
        let mut set = NormalizedPointSet::with_capacity(scan.len());

        for (i, &r) in scan.ranges.iter().enumerate() {
            set.push(scan.angle_at(i), r, gate.is_valid(r));
        }
        set.update_span();
        set
    }

    /// Point-cloud path: downsample, then convert to polar form.
    pub fn from_cloud(&mut self, cloud: &PointCloud) -> NormalizedPointSet {
        if cloud.is_empty() {
            log::warn!("Received an empty point cloud, nothing to match");
            return NormalizedPointSet::default();
        }

        let kept = self.downsampler.apply(&cloud.points);
        let mut set = NormalizedPointSet::with_capacity(kept.len());
        let mut nan_count = 0usize;

        for p in &kept {
            let angle = p.y.atan2(p.x);
            if p.has_nan() {
                nan_count += 1;
                set.push(angle, f64::NAN, false);
                continue;
            }
            let r = p.norm();
            set.push(angle, r, self.cloud_gate.is_valid(r));
        }

        if nan_count > 0 {
            log::warn!(
                "Point cloud contains {} NaN points; filter the cloud upstream",
                nan_count
            );
        }
        if !self.warned_unordered && !set.is_angle_monotonic() {
            log::warn!("Point cloud is not sorted by bearing; angular span may be inaccurate");
            self.warned_unordered = true;
        }

        set.update_span();
        set
    }
}

impl Default for PointSetNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}
