//! End-of-run report.

use crate::error::{LidarError, Result, ResultExt};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::jitter::JitterStats;
use crate::pipeline::shutdown::StopReason;
use crate::pipeline::stage::{StageOutcome, StageStats};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What happened during one pipeline run, in stage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Local>,
    pub stopped_at: DateTime<Local>,
    pub stop_reason: Option<StopReason>,
    pub stages: Vec<StageStats>,
}

impl PipelineReport {
    /// Wake lateness statistics of the acquisition stage.
    pub fn acquisition_jitter(&self) -> Option<JitterStats> {
        self.stages.first().and_then(|s| s.jitter)
    }

    /// Frames the final stage handed to the sink.
    pub fn frames_published(&self) -> u64 {
        self.stages.last().map(|s| s.frames_out).unwrap_or(0)
    }

    pub fn overruns(&self) -> u64 {
        self.stages.iter().map(|s| s.overruns).sum()
    }

    /// First stage that did not end by cancellation.
    pub fn failure(&self) -> Option<&StageStats> {
        self.stages
            .iter()
            .find(|s| s.outcome != StageOutcome::Cancelled)
    }

    /// Turn a failed or panicked stage into an error.
    pub fn into_result(self) -> PipelineResult<Self> {
        match self.failure().map(|s| (s.name.clone(), s.outcome.clone())) {
            Some((stage, StageOutcome::Failed(message))) => {
                Err(PipelineError::StageFailed { stage, message })
            }
            Some((stage, StageOutcome::Panicked)) => Err(PipelineError::StagePanicked(stage)),
            _ => Ok(self),
        }
    }

    /// Write the report as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LidarError::Serialization(e.to_string()))?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report {:?}", path))
    }

    pub fn log_summary(&self) {
        let elapsed = self.stopped_at - self.started_at;
        tracing::info!(
            "Pipeline ran for {:.3}s, published {} frame(s), {} overrun(s)",
            elapsed.num_milliseconds() as f64 / 1000.0,
            self.frames_published(),
            self.overruns()
        );
        match self.acquisition_jitter() {
            Some(j) => tracing::info!(
                "Wake jitter over {} cycles: mean {:.1}us, std dev {:.1}us, max {:.1}us",
                j.samples,
                j.mean_us,
                j.std_dev_us,
                j.max_us
            ),
            None => tracing::info!("Wake jitter: no data"),
        }
        for stage in &self.stages {
            tracing::debug!(
                "Stage '{}': in {}, out {}, sink failures {}, {:?}",
                stage.name,
                stage.frames_in,
                stage.frames_out,
                stage.sink_failures,
                stage.outcome
            );
        }
    }
}
