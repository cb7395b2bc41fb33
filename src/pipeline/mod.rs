//! Fixed-rate multi-stage frame pipeline.
//!
//! Frames are acquired periodically, handed from stage to stage through
//! single-slot channels and published by the last stage. Every stage runs on
//! its own thread; a single [`ShutdownCoordinator`] stops them all.
//!
//! # Architecture
//!
//! ```text
//! [acquire] ──slot──► [preprocess] ──slot──► [identify] ──► [sink]
//!     ▲
//!  WakeSchedule (absolute deadlines, jitter sampled here)
//! ```
//!
//! # Design
//!
//! - **Back-pressure**: a channel holds at most one frame; a producer waits
//!   until the consumer has taken the previous one.
//! - **Absolute deadlines**: wake times are `start + n * period`, so timing
//!   errors never accumulate.
//! - **Deferred stop**: signal handlers only set a [`StopRequest`]; the
//!   [`Supervisor`] thread performs the locking shutdown.
//! - **Failure stops everything**: a source or processor error, or a stage
//!   panic, shuts the whole pipeline down and is reported by `join`.

pub mod channel;
pub mod error;
pub mod executor;
pub mod jitter;
pub mod node;
pub mod nodes;
pub mod report;
pub mod scheduler;
pub mod shutdown;
pub mod stage;

pub use channel::{SlotChannel, SlotEvent};
pub use error::{Cancelled, PipelineError, PipelineResult, StageError};
pub use executor::{Pipeline, PipelineBuilder, PipelineHandle, DEFAULT_PERIOD};
pub use jitter::{JitterMonitor, JitterStats};
pub use node::{FnProcessor, FrameProcessor, FrameSink, FrameSource, PassThrough};
pub use report::PipelineReport;
pub use scheduler::{Clock, MonotonicClock, Wake, WakeSchedule};
pub use shutdown::{
    CoordinatorState, Interruptible, RunState, ShutdownCoordinator, StopReason, StopRequest,
    StopSignal, Supervisor,
};
pub use stage::{Downstream, StageOutcome, StageRunner, StageStats, Upstream};
