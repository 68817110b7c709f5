//! State shared between threads.
//!
//! Motion sample cells live with the predictor in
//! [`crate::sensors::motion`]; this module holds the scan handoff.

mod latest;

pub use latest::LatestSlot;
