//! Stage runner: the loop executed by every pipeline thread.
//!
//! Each cycle:
//! 1. Pull a frame: wait for the next scheduled wake and load from the
//!    frame source (acquisition), or `take` from the upstream channel.
//! 2. Run the stage's processor, if it has one.
//! 3. Push the result: `put` into the downstream channel, or publish to the
//!    sink (final stage).
//!
//! A `Cancelled` from either channel ends the loop quietly. A source or
//! processor error stops the whole pipeline through the coordinator before
//! the stage exits.

use crate::pipeline::channel::SlotChannel;
use crate::pipeline::error::{Cancelled, StageError};
use crate::pipeline::jitter::{JitterMonitor, JitterStats};
use crate::pipeline::node::{FrameProcessor, FrameSink, FrameSource};
use crate::pipeline::scheduler::{Clock, WakeSchedule};
use crate::pipeline::shutdown::{ShutdownCoordinator, StopReason, StopSignal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a stage gets its frames from.
pub enum Upstream<T: Send + 'static> {
    /// Periodic acquisition from an external source.
    Source {
        source: Box<dyn FrameSource<T>>,
        schedule: WakeSchedule,
        clock: Box<dyn Clock>,
    },
    Channel(Arc<SlotChannel<T>>),
}

/// Where a stage hands its frames to.
pub enum Downstream<T: Send + 'static> {
    Channel(Arc<SlotChannel<T>>),
    Sink(Box<dyn FrameSink<T>>),
}

/// How a stage loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    /// Observed shutdown at a channel or between cycles.
    Cancelled,
    /// A collaborator failed; this stage stopped the pipeline.
    Failed(String),
    /// The thread panicked.
    Panicked,
}

/// Per-stage counters returned when the thread is joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub name: String,
    pub frames_in: u64,
    pub frames_out: u64,
    pub sink_failures: u64,
    pub outcome: StageOutcome,
    /// Wake lateness, acquisition stage only.
    pub jitter: Option<JitterStats>,
    pub overruns: u64,
    pub skipped_wakes: u64,
}

impl StageStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            frames_in: 0,
            frames_out: 0,
            sink_failures: 0,
            outcome: StageOutcome::Cancelled,
            jitter: None,
            overruns: 0,
            skipped_wakes: 0,
        }
    }

    /// Placeholder for a stage whose thread could not be joined.
    pub fn panicked(name: &str) -> Self {
        Self {
            outcome: StageOutcome::Panicked,
            ..Self::new(name)
        }
    }
}

enum Halt {
    Cancelled,
    Failed(StageError),
}

impl From<Cancelled> for Halt {
    fn from(_: Cancelled) -> Self {
        Halt::Cancelled
    }
}

/// Stops the pipeline if the stage thread unwinds, so that its neighbours
/// are not left blocked on a channel nobody serves.
struct PanicGuard<'a> {
    stage: &'a str,
    coordinator: &'a ShutdownCoordinator,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.coordinator.shutdown(StopReason::StageFailed {
                stage: self.stage.to_string(),
                message: "stage thread panicked".to_string(),
            });
        }
    }
}

/// One pipeline stage: upstream, optional processor, downstream.
pub struct StageRunner<T: Send + 'static> {
    name: String,
    upstream: Upstream<T>,
    processor: Option<Box<dyn FrameProcessor<T>>>,
    downstream: Downstream<T>,
    coordinator: Arc<ShutdownCoordinator>,
    stop: StopSignal,
    jitter: JitterMonitor,
    stats: StageStats,
}

impl<T: Send + 'static> StageRunner<T> {
    pub fn new(
        name: impl Into<String>,
        upstream: Upstream<T>,
        processor: Option<Box<dyn FrameProcessor<T>>>,
        downstream: Downstream<T>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        let name = name.into();
        let stats = StageStats::new(&name);
        Self {
            name,
            upstream,
            processor,
            downstream,
            stop: coordinator.stop_signal(),
            coordinator,
            jitter: JitterMonitor::new(),
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run cycles until cancelled or failed.
    pub fn run(mut self) -> StageStats {
        tracing::debug!("Stage '{}' started", self.name);

        let coordinator = self.coordinator.clone();
        let name = self.name.clone();
        let _guard = PanicGuard {
            stage: &name,
            coordinator: &coordinator,
        };

        let outcome = loop {
            match self.cycle() {
                Ok(()) => {}
                Err(Halt::Cancelled) => break StageOutcome::Cancelled,
                Err(Halt::Failed(err)) => {
                    let message = err.to_string();
                    tracing::error!("Stage '{}' failed: {}", self.name, message);
                    self.coordinator.shutdown(StopReason::StageFailed {
                        stage: self.name.clone(),
                        message: message.clone(),
                    });
                    break StageOutcome::Failed(message);
                }
            }
        };

        self.stats.outcome = outcome;
        self.stats.jitter = self.jitter.snapshot();
        if let Upstream::Source { schedule, .. } = &self.upstream {
            self.stats.overruns = schedule.overruns();
            self.stats.skipped_wakes = schedule.skipped();
        }

        tracing::debug!(
            "Stage '{}' exiting after {} frame(s): {:?}",
            self.name,
            self.stats.frames_out,
            self.stats.outcome
        );
        self.stats
    }

    fn cycle(&mut self) -> Result<(), Halt> {
        if !self.coordinator.is_running() {
            return Err(Halt::Cancelled);
        }

        let frame = self.pull()?;
        self.stats.frames_in += 1;

        let frame = match self.processor.as_mut() {
            Some(processor) => processor.process(frame).map_err(Halt::Failed)?,
            None => frame,
        };

        self.push(frame)?;

        if let Upstream::Source {
            schedule, clock, ..
        } = &mut self.upstream
        {
            schedule.advance(clock.as_ref());
        }
        Ok(())
    }

    fn pull(&mut self) -> Result<T, Halt> {
        match &mut self.upstream {
            Upstream::Source {
                source,
                schedule,
                clock,
            } => {
                let wake = schedule.wait(clock.as_ref(), &self.stop);
                if !self.coordinator.is_running() {
                    return Err(Halt::Cancelled);
                }
                self.jitter.record(wake.lateness_us());
                source.load_next_frame().map_err(Halt::Failed)
            }
            Upstream::Channel(channel) => Ok(channel.take()?),
        }
    }

    fn push(&mut self, frame: T) -> Result<(), Halt> {
        match &mut self.downstream {
            Downstream::Channel(channel) => {
                channel.put(frame)?;
                self.stats.frames_out += 1;
            }
            Downstream::Sink(sink) => match sink.publish(frame) {
                Ok(()) => self.stats.frames_out += 1,
                Err(err) => {
                    self.stats.sink_failures += 1;
                    tracing::warn!("Stage '{}' sink error: {}", self.name, err);
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::node::{MockFrameProcessor, MockFrameSink, MockFrameSource, PassThrough};
    use crate::pipeline::scheduler::tests::ManualClock;
    use crate::pipeline::scheduler::MonotonicClock;
    use std::time::{Duration, Instant};

    fn acquisition(
        source: MockFrameSource<u32>,
        sink: MockFrameSink<u32>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> StageRunner<u32> {
        let start = Instant::now();
        StageRunner::new(
            "acquire",
            Upstream::Source {
                source: Box::new(source),
                schedule: WakeSchedule::new(start, Duration::from_millis(100)),
                clock: Box::new(ManualClock::new(start)),
            },
            None,
            Downstream::Sink(Box::new(sink)),
            coordinator,
        )
    }

    #[test]
    fn test_source_failure_stops_pipeline() {
        let coordinator = Arc::new(ShutdownCoordinator::new());

        let mut source = MockFrameSource::<u32>::new();
        let mut calls = 0;
        source.expect_load_next_frame().times(3).returning(move || {
            calls += 1;
            if calls < 3 {
                Ok(calls)
            } else {
                Err(StageError::Source("sensor unplugged".to_string()))
            }
        });
        let mut sink = MockFrameSink::<u32>::new();
        sink.expect_publish().times(2).returning(|_| Ok(()));

        let stats = acquisition(source, sink, coordinator.clone()).run();

        assert_eq!(stats.frames_out, 2);
        assert!(matches!(stats.outcome, StageOutcome::Failed(ref m) if m.contains("unplugged")));
        assert!(!coordinator.is_running());
        assert!(matches!(
            coordinator.reason(),
            Some(StopReason::StageFailed { stage, .. }) if stage == "acquire"
        ));
        let jitter = stats.jitter.unwrap();
        assert_eq!(jitter.samples, 3);
        assert_eq!(jitter.mean_us, 0.0);
    }

    #[test]
    fn test_sink_failure_is_not_fatal() {
        let coordinator = Arc::new(ShutdownCoordinator::new());

        let mut source = MockFrameSource::<u32>::new();
        let mut n = 0;
        source.expect_load_next_frame().returning(move || {
            n += 1;
            if n <= 4 {
                Ok(n)
            } else {
                Err(StageError::Source("done".to_string()))
            }
        });
        let mut sink = MockFrameSink::<u32>::new();
        sink.expect_publish().returning(|frame| {
            if frame % 2 == 0 {
                Err(StageError::Sink("disk full".to_string()))
            } else {
                Ok(())
            }
        });

        let stats = acquisition(source, sink, coordinator).run();

        assert_eq!(stats.frames_in, 4);
        assert_eq!(stats.frames_out, 2);
        assert_eq!(stats.sink_failures, 2);
    }

    #[test]
    fn test_shutdown_cuts_acquisition_sleep_short() {
        let coordinator = Arc::new(ShutdownCoordinator::new());

        let mut source = MockFrameSource::<u32>::new();
        source.expect_load_next_frame().never();
        let mut sink = MockFrameSink::<u32>::new();
        sink.expect_publish().never();

        let clock = MonotonicClock::default();
        let runner = StageRunner::new(
            "acquire",
            Upstream::Source {
                source: Box::new(source),
                schedule: WakeSchedule::new(clock.now(), Duration::from_secs(10)),
                clock: Box::new(clock),
            },
            None,
            Downstream::Sink(Box::new(sink)),
            coordinator.clone(),
        );
        let started = Instant::now();
        let handle = std::thread::spawn(move || runner.run());

        std::thread::sleep(Duration::from_millis(20));
        coordinator.shutdown(StopReason::External);
        let stats = handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(stats.outcome, StageOutcome::Cancelled);
        assert_eq!(stats.frames_in, 0);
        // The interrupted wake is not a jitter sample.
        assert!(stats.jitter.is_none());
    }

    #[test]
    fn test_processor_failure_stops_pipeline() {
        let mut coordinator = ShutdownCoordinator::new();
        let input = Arc::new(SlotChannel::new("loaded", coordinator.run_state()));
        coordinator.register(input.clone());
        let coordinator = Arc::new(coordinator);

        let mut processor = MockFrameProcessor::<u32>::new();
        processor
            .expect_process()
            .returning(|_| Err(StageError::Process("corrupt frame".to_string())));
        let mut sink = MockFrameSink::<u32>::new();
        sink.expect_publish().never();

        input.put(1).unwrap();
        let stats = StageRunner::new(
            "identify",
            Upstream::Channel(input.clone()),
            Some(Box::new(processor)),
            Downstream::Sink(Box::new(sink)),
            coordinator.clone(),
        )
        .run();

        assert_eq!(stats.frames_in, 1);
        assert_eq!(stats.frames_out, 0);
        assert!(matches!(stats.outcome, StageOutcome::Failed(_)));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_cancelled_stage_exits_quietly() {
        let mut coordinator = ShutdownCoordinator::new();
        let input = Arc::new(SlotChannel::<u32>::new("loaded", coordinator.run_state()));
        let output = Arc::new(SlotChannel::<u32>::new("preprocessed", coordinator.run_state()));
        coordinator.register(input.clone());
        coordinator.register(output.clone());
        let coordinator = Arc::new(coordinator);

        let runner = StageRunner::new(
            "preprocess",
            Upstream::Channel(input.clone()),
            Some(Box::new(PassThrough)),
            Downstream::Channel(output.clone()),
            coordinator.clone(),
        );
        let handle = std::thread::spawn(move || runner.run());

        input.put(10).unwrap();
        assert_eq!(output.take().unwrap(), 10);

        coordinator.shutdown(StopReason::External);
        let stats = handle.join().unwrap();

        assert_eq!(stats.outcome, StageOutcome::Cancelled);
        assert_eq!(stats.frames_out, 1);
        assert!(stats.jitter.is_none());
        assert_eq!(coordinator.reason(), Some(&StopReason::External));
    }

    #[test]
    fn test_panicking_stage_releases_neighbours() {
        let mut coordinator = ShutdownCoordinator::new();
        let input = Arc::new(SlotChannel::<u32>::new("loaded", coordinator.run_state()));
        coordinator.register(input.clone());
        let coordinator = Arc::new(coordinator);

        let mut processor = MockFrameProcessor::<u32>::new();
        processor
            .expect_process()
            .returning(|_| panic!("filter bug"));
        let mut sink = MockFrameSink::<u32>::new();
        sink.expect_publish().never();

        let runner = StageRunner::new(
            "identify",
            Upstream::Channel(input.clone()),
            Some(Box::new(processor)),
            Downstream::Sink(Box::new(sink)),
            coordinator.clone(),
        );
        input.put(1).unwrap();
        let result = std::thread::spawn(move || runner.run()).join();

        assert!(result.is_err());
        assert!(!coordinator.is_running());
        assert_eq!(input.put(2), Err(Cancelled));
    }
}
