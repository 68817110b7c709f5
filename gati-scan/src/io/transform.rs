//! Frame tree lookups.
//!
//! [`TransformService`] is what the odometry core needs from a frame tree:
//! a one-off static lookup for the sensor mount, and the motion of a frame
//! between two instants expressed through a fixed frame. Both calls are
//! bounded by a timeout and fail with a recoverable [`TransformError`].
//!
//! [`TransformBuffer`] is the in-process implementation: static edges plus a
//! bounded, time-ordered history per dynamic edge, with interpolation between
//! bracketing samples. Lookups park on a condition variable until data
//! arrives or the timeout expires.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::types::{Pose3D, Timestamped};
use crate::error::TransformError;

/// Query interface onto a frame tree.
pub trait TransformService: Send + Sync {
    /// Pose of `sensor_frame` in `base_frame` (`T_base_sensor`).
    fn resolve_static(
        &self,
        base_frame: &str,
        sensor_frame: &str,
        timeout: Duration,
    ) -> Result<Pose3D, TransformError>;

    /// Pose of `frame` at `t1_us` relative to `frame` at `t0_us`, chained
    /// through `fixed_frame`: `T_fixed_frame(t0)⁻¹ · T_fixed_frame(t1)`.
    fn relative_transform(
        &self,
        frame: &str,
        t0_us: u64,
        t1_us: u64,
        fixed_frame: &str,
        timeout: Duration,
    ) -> Result<Pose3D, TransformError>;
}

impl<T: TransformService + ?Sized> TransformService for Arc<T> {
    fn resolve_static(
        &self,
        base_frame: &str,
        sensor_frame: &str,
        timeout: Duration,
    ) -> Result<Pose3D, TransformError> {
        (**self).resolve_static(base_frame, sensor_frame, timeout)
    }

    fn relative_transform(
        &self,
        frame: &str,
        t0_us: u64,
        t1_us: u64,
        fixed_frame: &str,
        timeout: Duration,
    ) -> Result<Pose3D, TransformError> {
        (**self).relative_transform(frame, t0_us, t1_us, fixed_frame, timeout)
    }
}

/// Default number of dynamic samples kept per edge.
const DEFAULT_HISTORY: usize = 1000;

#[derive(Debug, Default)]
struct Edge {
    fixed: Option<Pose3D>,
    history: VecDeque<Timestamped<Pose3D>>,
}

impl Edge {
    /// Transform at `stamp_us`, or the newest one when `stamp_us` is `None`.
    fn at(&self, stamp_us: Option<u64>) -> Option<Pose3D> {
        if let Some(fixed) = self.fixed {
            return Some(fixed);
        }
        let Some(stamp) = stamp_us else {
            return self.history.back().map(|s| s.data);
        };

        // First sample at or after `stamp`
        let idx = self.history.partition_point(|s| s.timestamp_us < stamp);
        let after = self.history.get(idx)?;
        if after.timestamp_us == stamp {
            return Some(after.data);
        }
        let before = self.history.get(idx.checked_sub(1)?)?;
        let span = (after.timestamp_us - before.timestamp_us) as f64;
        let t = (stamp - before.timestamp_us) as f64 / span;
        Some(before.data.interpolate(&after.data, t))
    }
}

type EdgeKey = (String, String);

/// In-memory frame tree with bounded waits.
#[derive(Debug)]
pub struct TransformBuffer {
    edges: Mutex<HashMap<EdgeKey, Edge>>,
    updated: Condvar,
    history_limit: usize,
}

impl TransformBuffer {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Buffer keeping at most `history_limit` samples per dynamic edge.
    pub fn with_history(history_limit: usize) -> Self {
        Self {
            edges: Mutex::new(HashMap::new()),
            updated: Condvar::new(),
            history_limit: history_limit.max(2),
        }
    }

    /// Register a time-invariant `parent -> child` transform.
    pub fn set_static(&self, parent: &str, child: &str, pose: Pose3D) {
        let mut edges = self.edges.lock();
        let edge = edges.entry(Self::key(parent, child)).or_default();
        edge.fixed = Some(pose);
        edge.history.clear();
        drop(edges);
        self.updated.notify_all();
    }

    /// Record `parent -> child` at `stamp_us`.
    pub fn set_transform(&self, parent: &str, child: &str, stamp_us: u64, pose: Pose3D) {
        let mut edges = self.edges.lock();
        let edge = edges.entry(Self::key(parent, child)).or_default();
        let idx = edge.history.partition_point(|s| s.timestamp_us <= stamp_us);
        edge.history.insert(idx, Timestamped::new(pose, stamp_us));
        while edge.history.len() > self.history_limit {
            edge.history.pop_front();
        }
        drop(edges);
        self.updated.notify_all();
    }

    /// Non-blocking lookup of `T_parent_child`.
    pub fn lookup(
        &self,
        parent: &str,
        child: &str,
        stamp_us: Option<u64>,
    ) -> Result<Pose3D, TransformError> {
        let edges = self.edges.lock();
        Self::lookup_in(&edges, parent, child, stamp_us)
    }

    fn key(parent: &str, child: &str) -> EdgeKey {
        (
            parent.trim_start_matches('/').to_string(),
            child.trim_start_matches('/').to_string(),
        )
    }

    /// Direct edge, inverted edge, or one hop through a shared parent.
    fn lookup_in(
        edges: &HashMap<EdgeKey, Edge>,
        parent: &str,
        child: &str,
        stamp_us: Option<u64>,
    ) -> Result<Pose3D, TransformError> {
        let (parent, child) = Self::key(parent, child);
        if parent == child {
            return Ok(Pose3D::identity());
        }

        let mut known = false;
        let mut direct = |a: &str, b: &str| -> Option<Pose3D> {
            let edge = edges.get(&(a.to_string(), b.to_string()))?;
            known = true;
            edge.at(stamp_us)
        };

        if let Some(pose) = direct(&parent, &child) {
            return Ok(pose);
        }
        if let Some(pose) = direct(&child, &parent) {
            return Ok(pose.inverse());
        }

        for ((root, to_parent), edge) in edges.iter().filter(|((_, c), _)| *c == parent) {
            if let Some(root_to_child) = edges.get(&(root.clone(), child.clone())) {
                known = true;
                if let (Some(a), Some(b)) = (edge.at(stamp_us), root_to_child.at(stamp_us)) {
                    log::trace!("Chained {} -> {} through {}", to_parent, child, root);
                    return Ok(a.inverse().compose(&b));
                }
            }
        }

        match stamp_us {
            Some(stamp_us) if known => Err(TransformError::Extrapolation {
                parent,
                child,
                stamp_us,
            }),
            _ => Err(TransformError::FrameNotFound { parent, child }),
        }
    }

    /// Retry `query` under the lock until it succeeds or `timeout` expires.
    fn wait_for<F>(
        &self,
        parent: &str,
        child: &str,
        timeout: Duration,
        mut query: F,
    ) -> Result<Pose3D, TransformError>
    where
        F: FnMut(&HashMap<EdgeKey, Edge>) -> Result<Pose3D, TransformError>,
    {
        // A timeout past the clock's range waits for the edge itself
        let deadline = Instant::now().checked_add(timeout);
        let mut edges = self.edges.lock();
        loop {
            let last_err = match query(&edges) {
                Ok(pose) => return Ok(pose),
                Err(e) => e,
            };
            let timed_out = match deadline {
                Some(deadline) => self.updated.wait_until(&mut edges, deadline).timed_out(),
                None => {
                    self.updated.wait(&mut edges);
                    false
                }
            };
            if timed_out {
                // One last try with whatever arrived
                return query(&edges).map_err(|_| {
                    log::debug!("Transform query gave up: {}", last_err);
                    TransformError::Timeout {
                        parent: parent.to_string(),
                        child: child.to_string(),
                        waited_ms: timeout.as_millis() as u64,
                    }
                });
            }
        }
    }
}

impl Default for TransformBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformService for TransformBuffer {
    fn resolve_static(
        &self,
        base_frame: &str,
        sensor_frame: &str,
        timeout: Duration,
    ) -> Result<Pose3D, TransformError> {
        self.wait_for(base_frame, sensor_frame, timeout, |edges| {
            Self::lookup_in(edges, base_frame, sensor_frame, None)
        })
    }

    fn relative_transform(
        &self,
        frame: &str,
        t0_us: u64,
        t1_us: u64,
        fixed_frame: &str,
        timeout: Duration,
    ) -> Result<Pose3D, TransformError> {
        self.wait_for(fixed_frame, frame, timeout, |edges| {
            let start = Self::lookup_in(edges, fixed_frame, frame, Some(t0_us))?;
            let end = Self::lookup_in(edges, fixed_frame, frame, Some(t1_us))?;
            Ok(start.inverse().compose(&end))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_static_lookup_and_inverse() {
        let buf = TransformBuffer::new();
        buf.set_static("base_link", "laser", Pose3D::from_xy_yaw(0.2, 0.0, 0.1));

        let fwd = buf.lookup("base_link", "laser", None).unwrap();
        let inv = buf.lookup("/laser", "base_link", None).unwrap();
        assert_relative_eq!(fwd.x(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(fwd.compose(&inv).x(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lookup_through_shared_parent() {
        let buf = TransformBuffer::new();
        buf.set_static("base_link", "laser", Pose3D::from_xy_yaw(0.2, 0.0, 0.0));
        buf.set_static("base_link", "imu", Pose3D::from_xy_yaw(0.0, 0.1, 0.0));

        let laser_to_imu = buf.lookup("laser", "imu", None).unwrap();
        assert_relative_eq!(laser_to_imu.x(), -0.2, epsilon = 1e-12);
        assert_relative_eq!(laser_to_imu.y(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolated_lookup() {
        let buf = TransformBuffer::new();
        buf.set_transform("world", "base_link", 1_000, Pose3D::from_xy_yaw(0.0, 0.0, 0.0));
        buf.set_transform("world", "base_link", 3_000, Pose3D::from_xy_yaw(2.0, 0.0, 0.2));

        let mid = buf.lookup("world", "base_link", Some(2_000)).unwrap();
        assert_relative_eq!(mid.x(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(mid.yaw(), 0.1, epsilon = 1e-9);

        let err = buf.lookup("world", "base_link", Some(5_000)).unwrap_err();
        assert!(matches!(err, TransformError::Extrapolation { .. }));
    }

    #[test]
    fn test_relative_transform() {
        let buf = TransformBuffer::new();
        buf.set_transform("world", "base_link", 0, Pose3D::from_xy_yaw(1.0, 1.0, std::f64::consts::FRAC_PI_2));
        buf.set_transform("world", "base_link", 100, Pose3D::from_xy_yaw(1.0, 2.0, std::f64::consts::FRAC_PI_2));

        let rel = buf
            .relative_transform("base_link", 0, 100, "world", Duration::ZERO)
            .unwrap();
        // One meter along world +y is one meter forward for a platform facing +y
        assert_relative_eq!(rel.x(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(rel.y(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(rel.yaw(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_frame_times_out() {
        let buf = TransformBuffer::new();
        let started = Instant::now();
        let err = buf
            .resolve_static("base_link", "laser", Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, TransformError::Timeout { waited_ms: 20, .. }));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_sees_late_arrival() {
        let buf = Arc::new(TransformBuffer::new());
        let writer = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.set_static("base_link", "laser", Pose3D::from_xy_yaw(0.3, 0.0, 0.0));
        });

        let pose = buf
            .resolve_static("base_link", "laser", Duration::from_secs(2))
            .unwrap();
        assert_relative_eq!(pose.x(), 0.3, epsilon = 1e-12);
        handle.join().unwrap();
    }

    #[test]
    fn test_unbounded_timeout_waits_for_edge() {
        let buf = Arc::new(TransformBuffer::new());
        let writer = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.set_static("base_link", "laser", Pose3D::from_xy_yaw(0.0, 0.4, 0.0));
        });

        let pose = buf
            .resolve_static("base_link", "laser", Duration::MAX)
            .unwrap();
        assert_relative_eq!(pose.y(), 0.4, epsilon = 1e-12);
        handle.join().unwrap();
    }

    #[test]
    fn test_history_is_bounded() {
        let buf = TransformBuffer::with_history(3);
        for i in 0..10u64 {
            buf.set_transform("world", "base_link", i * 10, Pose3D::from_xy_yaw(i as f64, 0.0, 0.0));
        }
        assert!(buf.lookup("world", "base_link", Some(0)).is_err());
        assert_relative_eq!(buf.lookup("world", "base_link", Some(80)).unwrap().x(), 8.0);
    }
}
