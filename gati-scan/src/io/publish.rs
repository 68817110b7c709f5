//! Pose output.
//!
//! A resolved [`PoseEstimate`] fans out into one message per enabled
//! format. Sinks decide where messages go: a JSON-lines stream
//! ([`JsonLinesSink`]) or an in-process channel ([`ChannelSink`]).
//!
//! Covariance is always carried as 36 row-major values over
//! `(x, y, z, roll, pitch, yaw)` with only the x/y block and the yaw
//! variance populated.

use std::io::Write;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::core::types::{Pose2D, Pose3D};
use crate::engine::scan_odometry::PoseEstimate;
use crate::error::{GatiError, Result};

/// Which output formats to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishFlags {
    pub transform: bool,
    pub pose: bool,
    pub pose_stamped: bool,
    pub pose_with_covariance: bool,
    pub pose_with_covariance_stamped: bool,
}

impl Default for PublishFlags {
    fn default() -> Self {
        Self {
            transform: true,
            pose: true,
            pose_stamped: false,
            pose_with_covariance: false,
            pose_with_covariance_stamped: false,
        }
    }
}

/// One published message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputMessage {
    /// Planar pose, unstamped
    Pose2d { pose: Pose2D },
    PoseStamped {
        stamp_us: u64,
        frame_id: String,
        pose: Pose3D,
    },
    PoseWithCovariance { pose: Pose3D, covariance: Vec<f64> },
    PoseWithCovarianceStamped {
        stamp_us: u64,
        frame_id: String,
        pose: Pose3D,
        covariance: Vec<f64>,
    },
    /// Fixed → platform transform broadcast
    Transform {
        stamp_us: u64,
        parent: String,
        child: String,
        transform: Pose3D,
    },
}

/// Destination for output messages.
pub trait PoseSink {
    fn publish(&mut self, message: &OutputMessage) -> Result<()>;
}

impl<S: PoseSink + ?Sized> PoseSink for Box<S> {
    fn publish(&mut self, message: &OutputMessage) -> Result<()> {
        (**self).publish(message)
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PoseSink for JsonLinesSink<W> {
    fn publish(&mut self, message: &OutputMessage) -> Result<()> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards messages to a channel consumer.
#[derive(Clone)]
pub struct ChannelSink {
    sender: Sender<OutputMessage>,
}

impl ChannelSink {
    pub fn new(sender: Sender<OutputMessage>) -> Self {
        Self { sender }
    }
}

impl PoseSink for ChannelSink {
    fn publish(&mut self, message: &OutputMessage) -> Result<()> {
        self.sender
            .send(message.clone())
            .map_err(|_| GatiError::ChannelClosed)
    }
}

/// Turns estimates into messages for the enabled formats.
#[derive(Debug, Clone)]
pub struct PosePublisher {
    flags: PublishFlags,
    base_frame: String,
    fixed_frame: String,
}

impl PosePublisher {
    pub fn new(flags: PublishFlags, base_frame: impl Into<String>, fixed_frame: impl Into<String>) -> Self {
        Self {
            flags,
            base_frame: base_frame.into(),
            fixed_frame: fixed_frame.into(),
        }
    }

    /// Messages for `estimate`, in a fixed order.
    pub fn messages(&self, estimate: &PoseEstimate) -> Vec<OutputMessage> {
        let flags = self.flags;
        let pose = estimate.pose;
        let covariance = || estimate.covariance.to_row_major_6x6().to_vec();
        let mut out = Vec::new();

        if flags.pose {
            out.push(OutputMessage::Pose2d {
                pose: pose.to_pose2d(),
            });
        }
        if flags.pose_stamped {
            out.push(OutputMessage::PoseStamped {
                stamp_us: estimate.stamp_us,
                frame_id: self.fixed_frame.clone(),
                pose,
            });
        }
        if flags.pose_with_covariance {
            out.push(OutputMessage::PoseWithCovariance {
                pose,
                covariance: covariance(),
            });
        }
        if flags.pose_with_covariance_stamped {
            out.push(OutputMessage::PoseWithCovarianceStamped {
                stamp_us: estimate.stamp_us,
                frame_id: self.fixed_frame.clone(),
                pose,
                covariance: covariance(),
            });
        }
        if flags.transform {
            out.push(OutputMessage::Transform {
                stamp_us: estimate.stamp_us,
                parent: self.fixed_frame.clone(),
                child: self.base_frame.clone(),
                transform: pose,
            });
        }
        out
    }

    /// Send every enabled message for `estimate` to `sink`.
    pub fn publish<S: PoseSink + ?Sized>(&self, sink: &mut S, estimate: &PoseEstimate) -> Result<()> {
        for message in self.messages(estimate) {
            sink.publish(&message)?;
        }
        Ok(())
    }
}
