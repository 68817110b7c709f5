//! Core foundation layer.
//!
//! This is the bottom layer of the stack with no internal dependencies.
//!
//! # Contents
//!
//! - [`types`]: Core data types (poses, transforms, scans, point sets)
//! - [`math`]: Mathematical primitives (angle normalization)

pub mod math;
pub mod types;
