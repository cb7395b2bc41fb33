//! Error handling for lidar-rt
//!
//! This module defines the crate-level error type and a Result alias used
//! by configuration loading, frame parsing and real-time environment setup.
//! Errors raised while the pipeline runs live in [`crate::pipeline::error`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lidar-rt operations
#[derive(Error, Debug)]
pub enum LidarError {
    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A point-cloud file contained a line that is not three floats
    #[error("Frame parse error in {path:?} at line {line}: {message}")]
    FrameParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Real-time environment could not be established
    #[error("Real-time setup error: {0}")]
    Realtime(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LidarError>,
    },
}

impl LidarError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LidarError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for lidar-rt operations
pub type Result<T> = std::result::Result<T, LidarError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LidarError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| LidarError::Io(e).with_context(f()))
    }
}
