//! Matcher Thread - runs scan odometry on the newest scan.
//!
//! This thread:
//! - Takes the newest scan from the [`LatestSlot`] (older ones are dropped)
//! - Runs one odometry cycle to completion
//! - Publishes the resulting pose to the sink
//!
//! It drains the slot before exiting once `running` is cleared.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::algorithms::matching::ScanMatcher;
use crate::core::types::Timestamped;
use crate::engine::scan_odometry::{CycleOutcome, ScanOdometry, ScanOdometryStats, SensorFrame};
use crate::io::publish::{PosePublisher, PoseSink};
use crate::state::LatestSlot;

/// How long the thread waits for a scan before checking `running`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Scan handoff from producers to the matcher thread.
pub type ScanSlot = LatestSlot<Timestamped<SensorFrame>>;

/// Matcher Thread handle.
pub struct MatcherThread {
    handle: JoinHandle<ScanOdometryStats>,
}

impl MatcherThread {
    /// Spawn the matcher thread.
    pub fn spawn<M, S>(
        mut odometry: ScanOdometry<M>,
        publisher: PosePublisher,
        mut sink: S,
        slot: Arc<ScanSlot>,
        running: Arc<AtomicBool>,
    ) -> io::Result<Self>
    where
        M: ScanMatcher + 'static,
        S: PoseSink + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("matcher".into())
            .spawn(move || {
                loop {
                    // Checked before taking so a scan put just before shutdown is still drained
                    let stopping = !running.load(Ordering::SeqCst);
                    let next = if stopping {
                        slot.try_take()
                    } else {
                        slot.take_timeout(POLL_INTERVAL)
                    };
                    let Some(scan) = next else {
                        if stopping {
                            break;
                        }
                        continue;
                    };

                    if let CycleOutcome::Estimated(estimate) = odometry.process(scan)
                        && let Err(e) = publisher.publish(&mut sink, &estimate)
                    {
                        log::error!("Failed to publish pose: {}", e);
                        running.store(false, Ordering::Relaxed);
                    }
                }

                log::info!(
                    "Matcher thread exiting: {:?}, {} scans dropped",
                    odometry.stats(),
                    slot.dropped()
                );
                *odometry.stats()
            })?;

        Ok(Self { handle })
    }

    /// Wait for the thread to finish and return its final counters.
    pub fn join(self) -> thread::Result<ScanOdometryStats> {
        self.handle.join()
    }
}
