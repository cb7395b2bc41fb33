//! Real-time environment hook.
//!
//! Priority class, CPU pinning and timer resolution are process-wide
//! settings owned by the deployment, not by the pipeline. The pipeline only
//! requires that they are applied once before the stage threads start and
//! undone once after every stage thread has been joined. Implement
//! [`RealtimeEnvironment`] for the target platform and hand it to the
//! pipeline builder.

use crate::error::Result;

/// Platform real-time configuration applied around a pipeline run.
pub trait RealtimeEnvironment: Send {
    /// Apply the configuration. An error aborts startup.
    fn enter(&mut self) -> Result<()>;

    /// Undo whatever `enter` applied.
    fn restore(&mut self);
}

/// Leaves the process as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRealtime;

impl RealtimeEnvironment for NoopRealtime {
    fn enter(&mut self) -> Result<()> {
        tracing::debug!("No real-time environment configured");
        Ok(())
    }

    fn restore(&mut self) {}
}

/// Restores the environment exactly once, when dropped.
pub struct RealtimeGuard {
    env: Box<dyn RealtimeEnvironment>,
}

impl RealtimeGuard {
    /// Enter `env`; on failure nothing needs restoring.
    pub fn enter(mut env: Box<dyn RealtimeEnvironment>) -> Result<Self> {
        env.enter()?;
        Ok(Self { env })
    }
}

impl Drop for RealtimeGuard {
    fn drop(&mut self) {
        self.env.restore();
        tracing::debug!("Real-time environment restored");
    }
}
