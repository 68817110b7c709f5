//! Latest-sample cells shared between producers and the matcher.

use std::sync::Arc;

use nalgebra::UnitQuaternion;
use parking_lot::Mutex;

use crate::core::types::{Pose3D, Timestamped, Twist2D};

/// Latest value of one motion source plus the snapshot last consumed.
///
/// The first recorded value also seeds `last_used`, so the first
/// consumption yields zero relative motion.
#[derive(Debug, Clone)]
pub struct MotionSample<T> {
    latest: Timestamped<T>,
    last_used: T,
    received: bool,
}

impl<T: Copy> MotionSample<T> {
    /// Empty sample holding `initial` until something is recorded.
    pub fn new(initial: T) -> Self {
        Self {
            latest: Timestamped::new(initial, 0),
            last_used: initial,
            received: false,
        }
    }

    /// Store a new value.
    pub fn record(&mut self, value: T, timestamp_us: u64) {
        if !self.received {
            self.last_used = value;
            self.received = true;
        }
        self.latest = Timestamped::new(value, timestamp_us);
    }

    pub fn is_received(&self) -> bool {
        self.received
    }

    /// Latest value, `None` before the first arrival.
    pub fn latest(&self) -> Option<T> {
        self.received.then_some(self.latest.data)
    }

    /// Latest value even before any arrival (the initial value then).
    pub fn latest_or_initial(&self) -> T {
        self.latest.data
    }

    /// Stamp of the latest value.
    pub fn latest_stamp_us(&self) -> u64 {
        self.latest.timestamp_us
    }

    /// `(last_used, latest)`, then mark the latest value as used.
    pub fn consume(&mut self) -> Option<(T, T)> {
        if !self.received {
            return None;
        }
        let previous = self.last_used;
        self.last_used = self.latest.data;
        Some((previous, self.latest.data))
    }
}

/// Mutex-guarded sample shared by a producer and a prediction strategy.
pub type SampleCell<T> = Arc<Mutex<MotionSample<T>>>;

fn cell<T: Copy>(initial: T) -> SampleCell<T> {
    Arc::new(Mutex::new(MotionSample::new(initial)))
}

/// Accepted velocity message format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityFormat {
    Unstamped,
    Stamped,
}

/// Producer-side handle onto the three motion sample cells.
///
/// Cheap to clone; every clone writes the same cells. Each handler holds the
/// cell lock for the whole update.
#[derive(Debug, Clone)]
pub struct MotionInputs {
    velocity: SampleCell<Twist2D>,
    odometry: SampleCell<Pose3D>,
    orientation: SampleCell<UnitQuaternion<f64>>,
    velocity_format: VelocityFormat,
}

impl MotionInputs {
    pub fn new(velocity_format: VelocityFormat) -> Self {
        Self {
            velocity: cell(Twist2D::default()),
            odometry: cell(Pose3D::identity()),
            orientation: cell(UnitQuaternion::identity()),
            velocity_format,
        }
    }

    /// Unstamped platform-frame velocity.
    pub fn on_velocity(&self, twist: Twist2D) {
        if self.velocity_format != VelocityFormat::Unstamped {
            log::trace!("Ignoring unstamped velocity, stamped format configured");
            return;
        }
        self.velocity.lock().record(twist, 0);
    }

    /// Stamped platform-frame velocity.
    pub fn on_velocity_stamped(&self, twist: Timestamped<Twist2D>) {
        if self.velocity_format != VelocityFormat::Stamped {
            log::trace!("Ignoring stamped velocity, unstamped format configured");
            return;
        }
        self.velocity.lock().record(twist.data, twist.timestamp_us);
    }

    /// Wheel odometry pose in its own odometry frame.
    pub fn on_odometry(&self, pose: Timestamped<Pose3D>) {
        self.odometry.lock().record(pose.data, pose.timestamp_us);
    }

    /// Inertial orientation.
    pub fn on_imu(&self, orientation: Timestamped<UnitQuaternion<f64>>) {
        self.orientation
            .lock()
            .record(orientation.data, orientation.timestamp_us);
    }

    /// Latest inertial orientation, if one has arrived.
    pub fn latest_orientation(&self) -> Option<UnitQuaternion<f64>> {
        self.orientation.lock().latest()
    }

    pub fn velocity_cell(&self) -> SampleCell<Twist2D> {
        Arc::clone(&self.velocity)
    }

    pub fn odometry_cell(&self) -> SampleCell<Pose3D> {
        Arc::clone(&self.odometry)
    }

    pub fn orientation_cell(&self) -> SampleCell<UnitQuaternion<f64>> {
        Arc::clone(&self.orientation)
    }
}

impl Default for MotionInputs {
    fn default() -> Self {
        Self::new(VelocityFormat::Unstamped)
    }
}
