//! Recorded session replay.
//!
//! Sessions are JSON-lines files, one tagged record per line:
//!
//! ```text
//! {"type":"static_transform","parent":"base_link","child":"laser","transform":{...}}
//! {"type":"odometry","stamp_us":1000,"pose":{"position":[0,0,0],"orientation":[0,0,0,1]}}
//! {"type":"scan","stamp_us":1200,"frame_id":"laser","scan":{...}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Motion and frame
//! tree records are routed straight into [`MotionInputs`] and the
//! [`TransformBuffer`]; scans and clouds come back to the caller.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::core::types::{LaserScan, PointCloud, Pose3D, ScanInput, Timestamped, Twist2D};
use crate::engine::scan_odometry::SensorFrame;
use crate::error::{GatiError, Result};
use crate::io::transform::TransformBuffer;
use crate::sensors::motion::MotionInputs;

/// One line of a recorded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayRecord {
    Scan {
        stamp_us: u64,
        frame_id: String,
        scan: LaserScan,
    },
    Cloud {
        stamp_us: u64,
        frame_id: String,
        cloud: PointCloud,
    },
    Odometry {
        stamp_us: u64,
        pose: Pose3D,
    },
    Imu {
        stamp_us: u64,
        /// `[x, y, z, w]`
        orientation: [f64; 4],
    },
    Velocity {
        twist: Twist2D,
    },
    VelocityStamped {
        stamp_us: u64,
        twist: Twist2D,
    },
    Transform {
        stamp_us: u64,
        parent: String,
        child: String,
        transform: Pose3D,
    },
    StaticTransform {
        parent: String,
        child: String,
        transform: Pose3D,
    },
}

impl ReplayRecord {
    /// Stamp used for pacing; unstamped records return `None`.
    pub fn stamp_us(&self) -> Option<u64> {
        match self {
            ReplayRecord::Scan { stamp_us, .. }
            | ReplayRecord::Cloud { stamp_us, .. }
            | ReplayRecord::Odometry { stamp_us, .. }
            | ReplayRecord::Imu { stamp_us, .. }
            | ReplayRecord::VelocityStamped { stamp_us, .. }
            | ReplayRecord::Transform { stamp_us, .. } => Some(*stamp_us),
            ReplayRecord::Velocity { .. } | ReplayRecord::StaticTransform { .. } => None,
        }
    }
}

/// Line-by-line session reader.
pub struct ReplayReader<R: BufRead> {
    reader: R,
    line: String,
    line_number: usize,
}

impl ReplayReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplayReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
        }
    }

    /// Next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<ReplayRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let text = self.line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return serde_json::from_str(text).map(Some).map_err(|e| {
                GatiError::InvalidInput(format!("line {}: {}", self.line_number, e))
            });
        }
    }
}

impl<R: BufRead> Iterator for ReplayReader<R> {
    type Item = Result<ReplayRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Routes records to their consumers.
pub struct ReplayRouter {
    inputs: MotionInputs,
    tf: Arc<TransformBuffer>,
    use_cloud_input: bool,
    warned_modality: bool,
}

impl ReplayRouter {
    /// `use_cloud_input` selects which scan modality is accepted.
    pub fn new(inputs: MotionInputs, tf: Arc<TransformBuffer>, use_cloud_input: bool) -> Self {
        Self {
            inputs,
            tf,
            use_cloud_input,
            warned_modality: false,
        }
    }

    /// Deliver `record`; returns it back as a sensor frame when it is a scan
    /// of the configured modality.
    pub fn route(&mut self, record: ReplayRecord) -> Option<Timestamped<SensorFrame>> {
        match record {
            ReplayRecord::Scan {
                stamp_us,
                frame_id,
                scan,
            } => self.accept(false, stamp_us, frame_id, ScanInput::Ranged(scan)),
            ReplayRecord::Cloud {
                stamp_us,
                frame_id,
                cloud,
            } => self.accept(true, stamp_us, frame_id, ScanInput::Cloud(cloud)),
            ReplayRecord::Odometry { stamp_us, pose } => {
                self.inputs.on_odometry(Timestamped::new(pose, stamp_us));
                None
            }
            ReplayRecord::Imu {
                stamp_us,
                orientation: [x, y, z, w],
            } => {
                let q = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
                self.inputs.on_imu(Timestamped::new(q, stamp_us));
                None
            }
            ReplayRecord::Velocity { twist } => {
                self.inputs.on_velocity(twist);
                None
            }
            ReplayRecord::VelocityStamped { stamp_us, twist } => {
                self.inputs
                    .on_velocity_stamped(Timestamped::new(twist, stamp_us));
                None
            }
            ReplayRecord::Transform {
                stamp_us,
                parent,
                child,
                transform,
            } => {
                self.tf.set_transform(&parent, &child, stamp_us, transform);
                None
            }
            ReplayRecord::StaticTransform {
                parent,
                child,
                transform,
            } => {
                self.tf.set_static(&parent, &child, transform);
                None
            }
        }
    }

    fn accept(
        &mut self,
        is_cloud: bool,
        stamp_us: u64,
        frame_id: String,
        input: ScanInput,
    ) -> Option<Timestamped<SensorFrame>> {
        if is_cloud != self.use_cloud_input {
            if !self.warned_modality {
                log::warn!(
                    "Ignoring {} records, node configured for {} input",
                    if is_cloud { "cloud" } else { "scan" },
                    if self.use_cloud_input { "cloud" } else { "scan" }
                );
                self.warned_modality = true;
            }
            return None;
        }
        Some(Timestamped::new(SensorFrame { frame_id, input }, stamp_us))
    }
}

/// Sleeps so records are released at their recorded pace.
#[derive(Debug, Default)]
pub struct Pacer {
    start: Option<(Instant, u64)>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `stamp_us` is due relative to the first paced stamp.
    pub fn wait(&mut self, stamp_us: u64) {
        let Some((start, first_us)) = self.start else {
            self.start = Some((Instant::now(), stamp_us));
            return;
        };
        let target = Duration::from_micros(stamp_us.saturating_sub(first_us));
        let elapsed = start.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
    }
}
