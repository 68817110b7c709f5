//! Sensor processing layer.
//!
//! # Contents
//!
//! - [`preprocessing`]: scan and cloud normalization
//! - [`motion`]: motion sample cells and first-guess prediction
//! - [`calibration`]: static sensor mount cache

pub mod calibration;
pub mod motion;
pub mod preprocessing;
