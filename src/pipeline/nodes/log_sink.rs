//! LogSink: reports every final frame through tracing.
//!
//! Logs the number of surviving points together with the wall-clock time the
//! frame left the pipeline.

use crate::pipeline::error::StageError;
use crate::pipeline::node::FrameSink;
use crate::types::PointCloud;

#[derive(Debug, Default)]
pub struct LogSink {
    published: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl FrameSink<PointCloud> for LogSink {
    fn publish(&mut self, frame: PointCloud) -> Result<(), StageError> {
        self.published += 1;
        tracing::info!(
            "Frame {}: {} driveable point(s) at {}",
            self.published,
            frame.len(),
            chrono::Local::now().format("%H:%M:%S%.6f")
        );
        Ok(())
    }
}
