//! Mock construction helpers

use lidar_rt::pipeline::{FrameProcessor, FrameSource, StageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared call counter
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wraps a frame source and counts `load_next_frame` calls
pub struct CountingSource<S> {
    inner: S,
    calls: CallCounter,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> (Self, CallCounter) {
        let calls = CallCounter::default();
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl<T: Send + 'static, S: FrameSource<T>> FrameSource<T> for CountingSource<S> {
    fn load_next_frame(&mut self) -> Result<T, StageError> {
        self.calls.bump();
        self.inner.load_next_frame()
    }
}

/// Pass-through processor that sleeps before returning each frame
pub struct SlowProcessor {
    delay: Duration,
    calls: CallCounter,
}

impl SlowProcessor {
    pub fn new(delay: Duration) -> (Self, CallCounter) {
        let calls = CallCounter::default();
        (
            Self {
                delay,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl<T: Send + 'static> FrameProcessor<T> for SlowProcessor {
    fn process(&mut self, frame: T) -> Result<T, StageError> {
        self.calls.bump();
        std::thread::sleep(self.delay);
        Ok(frame)
    }
}
