//! Cooperative shutdown for the stage threads.
//!
//! The pipeline has exactly one [`ShutdownCoordinator`]. It owns the shared
//! [`RunState`] flag and a handle to every single-slot channel, and performs
//! the one-time `Running → Stopping` transition:
//!
//! 1. clear the `running` flag,
//! 2. raise the [`StopSignal`], cutting short any acquisition sleep,
//! 3. for every channel, take its lock and wake both of its wait conditions.
//!
//! Waiters re-check the flag under the channel lock after every wake, so a
//! stage parked on either condition is always released.
//!
//! Asynchronous triggers (signal handlers) must not take locks. They get a
//! [`StopRequest`], which only stores to an atomic; the [`Supervisor`]
//! thread observes it and performs the transition on their behalf.

use crossbeam_channel::{bounded, tick, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// Shared `running` flag. Starts `true`, flips to `false` exactly once.
#[derive(Debug, Clone)]
pub struct RunState(Arc<AtomicBool>);

impl RunState {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns true only for the caller that performed the transition.
    fn stop(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Lock-free stop request, safe to fire from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopRequest(Arc<AtomicBool>);

impl StopRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to stop. Only performs an atomic store.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raised once when the pipeline stops. Timed sleeps wait on it.
///
/// The coordinator holds the only sender and drops it on shutdown, which
/// disconnects every clone of the receiver at once. Nothing is ever sent.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: Receiver<()>,
    _hold: Option<Sender<()>>,
}

impl StopSignal {
    fn pair() -> (Sender<()>, Self) {
        let (tx, rx) = bounded(0);
        (tx, Self { rx, _hold: None })
    }

    /// A signal that is never raised, for sleeping outside a pipeline.
    pub fn never() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            rx,
            _hold: Some(tx),
        }
    }

    pub fn is_raised(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until `deadline` or until the signal is raised.
    ///
    /// Returns true if the signal was raised.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        !matches!(
            self.rx.recv_deadline(deadline),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

/// Why the pipeline left the `Running` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Out-of-band request (interrupt, cycle limit, caller).
    External,
    /// A stage collaborator failed.
    StageFailed { stage: String, message: String },
    /// The pipeline could not be brought up completely.
    SetupFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::External => write!(f, "external stop request"),
            StopReason::StageFailed { stage, message } => {
                write!(f, "stage '{}' failed: {}", stage, message)
            }
            StopReason::SetupFailed(msg) => write!(f, "setup failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    Stopping,
}

/// Anything a stage can block on that must be woken at shutdown.
pub trait Interruptible: Send + Sync {
    fn name(&self) -> &str;

    /// Take the internal lock and wake every waiter.
    fn interrupt(&self);
}

/// Process-wide cancellation: the run flag plus every channel to wake.
///
/// Channels are registered while the coordinator is still exclusively
/// owned, before it is shared with the stage threads.
pub struct ShutdownCoordinator {
    run: RunState,
    stop_request: StopRequest,
    reason: OnceLock<StopReason>,
    channels: Vec<Arc<dyn Interruptible>>,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_signal: StopSignal,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (stop_tx, stop_signal) = StopSignal::pair();
        Self {
            run: RunState::new(),
            stop_request: StopRequest::new(),
            reason: OnceLock::new(),
            channels: Vec::new(),
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_signal,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run.clone()
    }

    pub fn stop_request(&self) -> StopRequest {
        self.stop_request.clone()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// Register a channel whose waiters must be released on shutdown.
    pub fn register(&mut self, channel: Arc<dyn Interruptible>) {
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    pub fn state(&self) -> CoordinatorState {
        if self.run.is_running() {
            CoordinatorState::Running
        } else {
            CoordinatorState::Stopping
        }
    }

    /// Reason recorded by the call that performed the transition.
    pub fn reason(&self) -> Option<&StopReason> {
        self.reason.get()
    }

    /// Perform the `Running → Stopping` transition.
    ///
    /// Returns false when the pipeline was already stopping; the second
    /// request is a no-op.
    pub fn shutdown(&self, reason: StopReason) -> bool {
        if !self.run.stop() {
            tracing::debug!("Shutdown already in progress, ignoring: {}", reason);
            return false;
        }

        tracing::info!("Pipeline stopping: {}", reason);
        let _ = self.reason.set(reason);
        drop(
            self.stop_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        for channel in &self.channels {
            channel.interrupt();
            tracing::trace!("Woke waiters on channel '{}'", channel.name());
        }
        true
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Dedicated thread turning a [`StopRequest`] into a coordinator shutdown.
pub struct Supervisor {
    coordinator: Arc<ShutdownCoordinator>,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(coordinator: Arc<ShutdownCoordinator>, poll_interval: Duration) -> Self {
        Self {
            coordinator,
            poll_interval,
        }
    }

    /// Poll until the pipeline stops, by request or by a stage.
    pub fn run(self) {
        let ticker = tick(self.poll_interval);
        let request = self.coordinator.stop_request();

        while self.coordinator.is_running() {
            if request.is_requested() {
                self.coordinator.shutdown(StopReason::External);
                break;
            }
            if ticker.recv().is_err() {
                break;
            }
        }
        tracing::debug!("Supervisor exiting");
    }
}
