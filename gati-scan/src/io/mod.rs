//! I/O and infrastructure layer.
//!
//! # Contents
//!
//! - [`transform`]: Frame tree service and in-process buffer
//! - [`publish`]: Output messages and sinks
//! - [`replay`]: Recorded session playback

pub mod publish;
pub mod replay;
pub mod transform;

pub use publish::{ChannelSink, JsonLinesSink, OutputMessage, PosePublisher, PoseSink, PublishFlags};
pub use replay::{Pacer, ReplayReader, ReplayRecord, ReplayRouter};
pub use transform::{TransformBuffer, TransformService};
