//! Scan normalization.
//!
//! Turns the two raw input modalities into one polar point-set format:
//!
//! ```text
//! LaserScan  ─────────────────────────→ RangeFilter ─┐
//!                                                    ├─→ NormalizedPointSet
//! PointCloud ─→ ResolutionDownsampler ─→ RangeFilter ─┘
//! ```

mod downsampler;
mod normalizer;
mod range_filter;

pub use downsampler::ResolutionDownsampler;
pub use normalizer::{NormalizerConfig, PointSetNormalizer};
pub use range_filter::RangeFilter;
