//! Worker threads.
//!
//! - `MatcherThread`: runs scan odometry on the newest scan, publishing as it goes

mod matcher_thread;

pub use matcher_thread::{MatcherThread, ScanSlot};
