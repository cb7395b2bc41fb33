//! Pipeline assembly and thread lifecycle.
//!
//! A pipeline is an ordered list of stages: one acquisition stage driven by
//! the periodic scheduler, followed by any number of processing stages. A
//! single-slot channel sits between each pair of neighbouring stages and
//! the last stage publishes to the sink:
//!
//! ```text
//! [acquire] ─slot─► [preprocess] ─slot─► [identify] ──► sink
//! ```
//!
//! The builder creates the shutdown coordinator and every channel once;
//! stages receive `Arc` handles at assembly time. `start` spawns one thread
//! per stage plus the supervisor, `PipelineHandle::join` waits for all of
//! them and returns a [`PipelineReport`].

use crate::config::PipelineConfig;
use crate::pipeline::channel::SlotChannel;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{FrameProcessor, FrameSink, FrameSource};
use crate::pipeline::nodes::{CropFilter, DriveableFilter, FileFrameSource};
use crate::pipeline::report::PipelineReport;
use crate::pipeline::scheduler::{Clock, MonotonicClock, WakeSchedule};
use crate::pipeline::shutdown::{ShutdownCoordinator, StopReason, StopRequest, Supervisor};
use crate::pipeline::stage::{Downstream, StageRunner, StageStats, Upstream};
use crate::realtime::{NoopRealtime, RealtimeEnvironment, RealtimeGuard};
use crate::types::PointCloud;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default acquisition period (10 Hz).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Default interval at which the supervisor checks for stop requests.
pub const DEFAULT_SUPERVISOR_POLL: Duration = Duration::from_millis(10);

/// A processing stage fed by a channel.
struct StageDescriptor<T: Send + 'static> {
    name: String,
    input: Arc<SlotChannel<T>>,
    processor: Box<dyn FrameProcessor<T>>,
    output: Downstream<T>,
}

/// Collects the stage list and collaborators, then wires the channels.
pub struct PipelineBuilder<T: Send + 'static> {
    period: Duration,
    supervisor_poll: Duration,
    clock: Box<dyn Clock>,
    realtime: Box<dyn RealtimeEnvironment>,
    source: Option<(String, Box<dyn FrameSource<T>>)>,
    stages: Vec<(String, Box<dyn FrameProcessor<T>>)>,
    sink: Option<Box<dyn FrameSink<T>>>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    pub fn new() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            supervisor_poll: DEFAULT_SUPERVISOR_POLL,
            clock: Box::new(MonotonicClock::default()),
            realtime: Box::new(NoopRealtime),
            source: None,
            stages: Vec::new(),
            sink: None,
        }
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn supervisor_poll(mut self, interval: Duration) -> Self {
        self.supervisor_poll = interval;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn realtime(mut self, env: impl RealtimeEnvironment + 'static) -> Self {
        self.realtime = Box::new(env);
        self
    }

    /// Set the acquisition stage.
    pub fn source(mut self, name: impl Into<String>, source: impl FrameSource<T> + 'static) -> Self {
        self.source = Some((name.into(), Box::new(source)));
        self
    }

    /// Append a processing stage after the current last stage.
    pub fn stage(
        mut self,
        name: impl Into<String>,
        processor: impl FrameProcessor<T> + 'static,
    ) -> Self {
        self.stages.push((name.into(), Box::new(processor)));
        self
    }

    pub fn sink(mut self, sink: impl FrameSink<T> + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Validate the topology and create the coordinator and channels.
    pub fn build(self) -> PipelineResult<Pipeline<T>> {
        if self.period.is_zero() {
            return Err(PipelineError::Topology("period must be non-zero".into()));
        }
        if self.supervisor_poll.is_zero() {
            return Err(PipelineError::Topology(
                "supervisor poll interval must be non-zero".into(),
            ));
        }
        let (source_name, source) = self
            .source
            .ok_or_else(|| PipelineError::Topology("pipeline has no frame source".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| PipelineError::Topology("pipeline has no sink".into()))?;

        let mut names: Vec<&str> = vec![source_name.as_str()];
        for (name, _) in &self.stages {
            if names.contains(&name.as_str()) {
                return Err(PipelineError::Topology(format!(
                    "duplicate stage name '{}'",
                    name
                )));
            }
            names.push(name);
        }

        let mut coordinator = ShutdownCoordinator::new();

        // One channel in front of every processing stage, named after the
        // stage that fills it.
        let mut channels: Vec<Arc<SlotChannel<T>>> = Vec::with_capacity(self.stages.len());
        let mut producer = source_name.as_str();
        for (name, _) in &self.stages {
            let channel = Arc::new(SlotChannel::new(
                format!("{}->{}", producer, name),
                coordinator.run_state(),
            ));
            coordinator.register(channel.clone());
            channels.push(channel);
            producer = name;
        }

        let mut sink = Some(sink);
        let mut descriptors = Vec::with_capacity(self.stages.len());
        let stage_count = self.stages.len();
        for (idx, (name, processor)) in self.stages.into_iter().enumerate() {
            let output = if idx + 1 < stage_count {
                Downstream::Channel(channels[idx + 1].clone())
            } else {
                Downstream::Sink(sink.take().ok_or_else(|| {
                    PipelineError::Topology("sink already assigned".into())
                })?)
            };
            descriptors.push(StageDescriptor {
                name,
                input: channels[idx].clone(),
                processor,
                output,
            });
        }

        let source_output = match channels.first() {
            Some(first) => Downstream::Channel(first.clone()),
            None => Downstream::Sink(
                sink.take()
                    .ok_or_else(|| PipelineError::Topology("sink already assigned".into()))?,
            ),
        };

        tracing::info!(
            "Pipeline assembled: {} stage(s), {} channel(s), period {:?}",
            descriptors.len() + 1,
            channels.len(),
            self.period
        );

        Ok(Pipeline {
            coordinator: Arc::new(coordinator),
            channels,
            source_name,
            source,
            source_output,
            descriptors,
            period: self.period,
            supervisor_poll: self.supervisor_poll,
            clock: self.clock,
            realtime: self.realtime,
        })
    }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder<PointCloud> {
    /// Acquire → preprocess → identify, configured from `config`.
    ///
    /// The sink is left for the caller to attach.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let source = FileFrameSource::new(config.source.frames.clone())
            .map_err(|e| PipelineError::Setup(e.to_string()))?;

        Ok(Self::new()
            .period(config.scheduler.period())
            .supervisor_poll(config.supervisor.poll_interval())
            .clock(MonotonicClock::new(config.scheduler.spin_threshold()))
            .source("acquire", source)
            .stage("preprocess", CropFilter::new(config.filters.preprocess.clone()))
            .stage(
                "identify",
                DriveableFilter::new(config.filters.identify.clone()),
            ))
    }
}

/// An assembled, not yet running pipeline.
pub struct Pipeline<T: Send + 'static> {
    coordinator: Arc<ShutdownCoordinator>,
    channels: Vec<Arc<SlotChannel<T>>>,
    source_name: String,
    source: Box<dyn FrameSource<T>>,
    source_output: Downstream<T>,
    descriptors: Vec<StageDescriptor<T>>,
    period: Duration,
    supervisor_poll: Duration,
    clock: Box<dyn Clock>,
    realtime: Box<dyn RealtimeEnvironment>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Lock-free stop handle; safe to trigger from a signal context.
    pub fn stop_request(&self) -> StopRequest {
        self.coordinator.stop_request()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        std::iter::once(self.source_name.as_str())
            .chain(self.descriptors.iter().map(|s| s.name.as_str()))
            .collect()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Enter the real-time environment and spawn every thread.
    ///
    /// Nothing is left running if any step fails.
    pub fn start(self) -> PipelineResult<PipelineHandle> {
        let realtime = RealtimeGuard::enter(self.realtime)
            .map_err(|e| PipelineError::Setup(format!("real-time environment: {}", e)))?;

        let coordinator = self.coordinator;
        let mut stages: Vec<(String, JoinHandle<StageStats>)> =
            Vec::with_capacity(self.descriptors.len() + 1);

        let start = self.clock.now();
        let acquisition = StageRunner::new(
            self.source_name.clone(),
            Upstream::Source {
                source: self.source,
                schedule: WakeSchedule::new(start, self.period),
                clock: self.clock,
            },
            None,
            self.source_output,
            coordinator.clone(),
        );

        let mut runners = vec![acquisition];
        for desc in self.descriptors {
            runners.push(StageRunner::new(
                desc.name,
                Upstream::Channel(desc.input),
                Some(desc.processor),
                desc.output,
                coordinator.clone(),
            ));
        }

        for runner in runners {
            let name = runner.name().to_string();
            let spawned = thread::Builder::new()
                .name(format!("stage-{}", name))
                .spawn(move || runner.run());
            match spawned {
                Ok(handle) => stages.push((name, handle)),
                Err(e) => {
                    let message = format!("failed to spawn stage '{}': {}", name, e);
                    abort_startup(&coordinator, stages, &message);
                    return Err(PipelineError::Setup(message));
                }
            }
        }

        let supervisor = Supervisor::new(coordinator.clone(), self.supervisor_poll);
        let supervisor = match thread::Builder::new()
            .name("supervisor".to_string())
            .spawn(move || supervisor.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                let message = format!("failed to spawn supervisor: {}", e);
                abort_startup(&coordinator, stages, &message);
                return Err(PipelineError::Setup(message));
            }
        };

        tracing::info!("Pipeline started with {} stage thread(s)", stages.len());

        Ok(PipelineHandle {
            coordinator,
            stages,
            supervisor,
            realtime,
            started_at: chrono::Local::now(),
        })
    }
}

fn abort_startup(
    coordinator: &ShutdownCoordinator,
    stages: Vec<(String, JoinHandle<StageStats>)>,
    message: &str,
) {
    coordinator.shutdown(StopReason::SetupFailed(message.to_string()));
    for (name, handle) in stages {
        if handle.join().is_err() {
            tracing::error!("Stage '{}' panicked during aborted startup", name);
        }
    }
}

/// A running pipeline.
pub struct PipelineHandle {
    coordinator: Arc<ShutdownCoordinator>,
    stages: Vec<(String, JoinHandle<StageStats>)>,
    supervisor: JoinHandle<()>,
    realtime: RealtimeGuard,
    started_at: chrono::DateTime<chrono::Local>,
}

impl PipelineHandle {
    pub fn stop_request(&self) -> StopRequest {
        self.coordinator.stop_request()
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Stop the pipeline from a regular thread. Idempotent.
    pub fn shutdown(&self) {
        self.coordinator.shutdown(StopReason::External);
    }

    /// Wait for every thread, restore the real-time environment and report.
    pub fn join(self) -> PipelineResult<PipelineReport> {
        let mut stats = Vec::with_capacity(self.stages.len());
        for (name, handle) in self.stages {
            match handle.join() {
                Ok(s) => stats.push(s),
                Err(_) => {
                    tracing::error!("Stage '{}' panicked", name);
                    stats.push(StageStats::panicked(&name));
                }
            }
        }

        if self.supervisor.join().is_err() {
            tracing::error!("Supervisor thread panicked");
        }
        drop(self.realtime);

        let report = PipelineReport {
            started_at: self.started_at,
            stopped_at: chrono::Local::now(),
            stop_reason: self.coordinator.reason().cloned(),
            stages: stats,
        };
        report.log_summary();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::node::{FnProcessor, PassThrough};
    use crate::pipeline::nodes::{ChannelSink, MemoryFrameSource};
    use crate::realtime::tests::RecordingRealtime;

    fn builder() -> PipelineBuilder<u32> {
        let (sink, _rx) = ChannelSink::unbounded();
        PipelineBuilder::new()
            .source("acquire", MemoryFrameSource::cycling(vec![1u32, 2, 3]))
            .sink(sink)
    }

    #[test]
    fn test_three_stage_topology() {
        let pipeline = builder()
            .stage("preprocess", PassThrough)
            .stage("identify", PassThrough)
            .build()
            .unwrap();

        assert_eq!(pipeline.stage_names(), vec!["acquire", "preprocess", "identify"]);
        assert_eq!(
            pipeline.channel_names(),
            vec!["acquire->preprocess", "preprocess->identify"]
        );
        assert_eq!(pipeline.coordinator.channel_count(), 2);
    }

    #[test]
    fn test_source_straight_to_sink() {
        let pipeline = builder().build().unwrap();
        assert_eq!(pipeline.stage_names(), vec!["acquire"]);
        assert!(pipeline.channel_names().is_empty());
    }

    #[test]
    fn test_missing_source_or_sink() {
        let (sink, _rx) = ChannelSink::<u32>::unbounded();
        let no_source = PipelineBuilder::<u32>::new().sink(sink).build();
        assert!(matches!(no_source, Err(PipelineError::Topology(_))));

        let no_sink = PipelineBuilder::new()
            .source("acquire", MemoryFrameSource::cycling(vec![1u32]))
            .build();
        assert!(matches!(no_sink, Err(PipelineError::Topology(_))));
    }

    #[test]
    fn test_duplicate_stage_names_rejected() {
        let result = builder()
            .stage("filter", PassThrough)
            .stage("filter", PassThrough)
            .build();
        assert!(matches!(result, Err(PipelineError::Topology(_))));
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = builder().period(Duration::ZERO).build();
        assert!(matches!(result, Err(PipelineError::Topology(_))));
    }

    #[test]
    fn test_realtime_failure_aborts_startup() {
        let env = RecordingRealtime {
            fail: true,
            ..Default::default()
        };
        let calls = env.calls.clone();
        let pipeline = builder()
            .stage("double", FnProcessor::new(|x: u32| Ok(x * 2)))
            .realtime(env)
            .build()
            .unwrap();

        let result = pipeline.start();
        assert!(matches!(result, Err(PipelineError::Setup(_))));
        assert_eq!(*calls.lock().unwrap(), vec!["enter"]);
    }

    #[test]
    fn test_realtime_restored_after_join() {
        let env = RecordingRealtime::default();
        let calls = env.calls.clone();
        let handle = builder()
            .period(Duration::from_millis(5))
            .supervisor_poll(Duration::from_millis(1))
            .realtime(env)
            .build()
            .unwrap()
            .start()
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["enter"]);
        handle.shutdown();
        let report = handle.join().unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["enter", "restore"]);
        assert_eq!(report.stop_reason, Some(StopReason::External));
    }
}
