//! Built-in frame sources, processors and sinks.

pub mod channel_sink;
pub mod crop_filter;
pub mod driveable_filter;
pub mod frame_source;
pub mod log_sink;

pub use channel_sink::ChannelSink;
pub use crop_filter::CropFilter;
pub use driveable_filter::DriveableFilter;
pub use frame_source::{FileFrameSource, MemoryFrameSource};
pub use log_sink::LogSink;
