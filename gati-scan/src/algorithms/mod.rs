//! Core algorithms layer.
//!
//! # Contents
//!
//! - [`matching`]: Scan matching (point-to-line ICP)

pub mod matching;
