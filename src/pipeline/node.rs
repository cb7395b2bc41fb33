//! Collaborator interfaces plugged into pipeline stages.
//!
//! - **`FrameSource`**: produces one frame per scheduler period (acquisition).
//! - **`FrameProcessor`**: turns one frame into exactly one frame (filters).
//! - **`FrameSink`**: consumes the final frame of every cycle.
//!
//! All three run synchronously on their stage's thread and never see the
//! channels or the shutdown coordinator. Errors from a source or processor
//! stop the whole pipeline; sink errors are logged and the stage carries on.

use crate::pipeline::error::StageError;

/// External frame producer for the acquisition stage.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource<T: Send + 'static>: Send {
    fn load_next_frame(&mut self) -> Result<T, StageError>;
}

/// Pure frame transformation run by an intermediate stage.
#[cfg_attr(test, mockall::automock)]
pub trait FrameProcessor<T: Send + 'static>: Send {
    fn process(&mut self, frame: T) -> Result<T, StageError>;
}

/// Terminal consumer of processed frames.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSink<T: Send + 'static>: Send {
    fn publish(&mut self, frame: T) -> Result<(), StageError>;
}

/// Adapts a closure into a [`FrameProcessor`].
pub struct FnProcessor<F>(F);

impl<F> FnProcessor<F> {
    pub fn new<T>(f: F) -> Self
    where
        F: FnMut(T) -> Result<T, StageError> + Send,
    {
        Self(f)
    }
}

impl<T, F> FrameProcessor<T> for FnProcessor<F>
where
    T: Send + 'static,
    F: FnMut(T) -> Result<T, StageError> + Send,
{
    fn process(&mut self, frame: T) -> Result<T, StageError> {
        (self.0)(frame)
    }
}

/// Forwards frames unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<T: Send + 'static> FrameProcessor<T> for PassThrough {
    fn process(&mut self, frame: T) -> Result<T, StageError> {
        Ok(frame)
    }
}
