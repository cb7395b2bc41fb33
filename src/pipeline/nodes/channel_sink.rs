//! ChannelSink: hands published frames to another thread via crossbeam channel.
//!
//! The sink never blocks the final stage: a full or disconnected receiver
//! is reported as a sink error, which the stage logs and survives.

use crate::pipeline::error::StageError;
use crate::pipeline::node::FrameSink;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

pub struct ChannelSink<T> {
    tx: Sender<T>,
    dropped: u64,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: Sender<T>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn unbounded() -> (Self, Receiver<T>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx), rx)
    }

    /// Frames that could not be delivered.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<T: Send + 'static> FrameSink<T> for ChannelSink<T> {
    fn publish(&mut self, frame: T) -> Result<(), StageError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Err(StageError::Sink("receiver full, frame dropped".to_string()))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                Err(StageError::Sink("receiver disconnected".to_string()))
            }
        }
    }
}

impl<T> Drop for ChannelSink<T> {
    fn drop(&mut self) {
        if self.dropped > 0 {
            tracing::warn!("ChannelSink dropped {} frame(s)", self.dropped);
        }
    }
}
