//! Pipeline-specific error types.

use thiserror::Error;

/// A channel operation observed that the pipeline is no longer running.
///
/// This is the expected unwind signal during shutdown, not a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pipeline cancelled")]
pub struct Cancelled;

/// Failure reported by an external collaborator (frame source, processor, sink).
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Processing error: {0}")]
    Process(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] crate::error::LidarError),
}

/// Errors that can occur while assembling or running the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Stage '{0}' panicked")]
    StagePanicked(String),

    #[error("Invalid topology: {0}")]
    Topology(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_display() {
        let err = PipelineError::StageFailed {
            stage: "preprocess".to_string(),
            message: "bad frame".to_string(),
        };
        assert_eq!(err.to_string(), "Stage 'preprocess' failed: bad frame");
    }

    #[test]
    fn test_stage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StageError = io.into();
        assert!(matches!(err, StageError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
