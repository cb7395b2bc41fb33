//! # lidar-rt: Fixed-Rate LiDAR Processing Pipeline
//!
//! A real-time pipeline that acquires point-cloud frames at a fixed rate,
//! pushes each one through a chain of processing stages and publishes the
//! result. Every stage runs on its own thread and neighbouring stages are
//! connected by single-slot channels, so a slow stage throttles its producer
//! instead of letting frames pile up.
//!
//! ## Architecture
//!
//! - **Scheduler**: absolute-deadline periodic wake-ups with jitter statistics
//! - **Channels**: one-frame hand-off with blocking `put`/`take`
//! - **Shutdown**: one coordinator that stops every stage and releases every waiter
//! - **Nodes**: file replay source, crop and drivable-surface filters, sinks
//!
//! ## Configuration
//!
//! The pipeline is configured from a TOML file. Without `--config` the binary
//! looks for `pipeline.toml` in the platform configuration directory under
//! `dev.hxyulin.lidar-rt`:
//!
//! - **Linux**: `~/.config/dev.hxyulin.lidar-rt/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.lidar-rt/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.lidar-rt\`
//!
//! ## Example
//!
//! ```ignore
//! use lidar_rt::{
//!     config::PipelineConfig,
//!     pipeline::{nodes::LogSink, PipelineBuilder},
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load_or_default("pipeline.toml");
//!
//!     let pipeline = PipelineBuilder::from_config(&config)?
//!         .sink(LogSink::new())
//!         .build()?;
//!
//!     let stop = pipeline.stop_request();
//!     let handle = pipeline.start()?;
//!     // Elsewhere (e.g. a Ctrl-C handler): stop.request();
//!
//!     let report = handle.join()?;
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod realtime;
pub mod types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{LidarError, Result};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineError, PipelineHandle, PipelineReport, PipelineResult,
    StopRequest,
};
pub use types::{Point3, PointCloud};
