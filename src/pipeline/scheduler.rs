//! Drift-free periodic wake-ups for the acquisition stage.
//!
//! Wake times are absolute: `next_wake` starts one period after the start
//! time and advances by exactly one period per cycle, no matter how long the
//! cycle's work took. A late cycle therefore does not shift every later
//! wake. When whole periods were missed the schedule jumps forward to the
//! next due wake on the original phase instead of firing back-to-back to
//! catch up.
//!
//! Sleeps are cut short by the pipeline's [`StopSignal`], so a stopping
//! pipeline never waits out the rest of a period.

use crate::pipeline::shutdown::StopSignal;
use std::time::{Duration, Instant};

/// Source of monotonic time and absolute sleeps.
pub trait Clock: Send {
    fn now(&self) -> Instant;

    /// Block the calling thread until `deadline`, or until `stop` is raised.
    /// Returns immediately if the deadline has already passed.
    fn sleep_until(&self, deadline: Instant, stop: &StopSignal);
}

/// `Instant`-based clock. Sleeps coarsely, then spins the last stretch for
/// sub-millisecond accuracy.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    spin_threshold: Duration,
}

impl MonotonicClock {
    pub fn new(spin_threshold: Duration) -> Self {
        Self { spin_threshold }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new(Duration::from_micros(500))
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant, stop: &StopSignal) {
        let now = Instant::now();
        if deadline <= now {
            return;
        }
        if deadline - now > self.spin_threshold
            && stop.wait_until(deadline - self.spin_threshold)
        {
            return;
        }
        while Instant::now() < deadline {
            if stop.is_raised() {
                return;
            }
            std::hint::spin_loop();
        }
    }
}

/// One realized wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub cycle: u64,
    pub scheduled: Instant,
    pub actual: Instant,
}

impl Wake {
    /// How late the wake was, in microseconds. This is the jitter sample.
    pub fn lateness_us(&self) -> f64 {
        self.actual.saturating_duration_since(self.scheduled).as_secs_f64() * 1e6
    }
}

/// Absolute wake schedule with a fixed period.
#[derive(Debug, Clone)]
pub struct WakeSchedule {
    next_wake: Instant,
    period: Duration,
    cycle: u64,
    overruns: u64,
    skipped: u64,
}

impl WakeSchedule {
    /// First wake is one full period after `start`.
    pub fn new(start: Instant, period: Duration) -> Self {
        Self {
            next_wake: start + period,
            period,
            cycle: 0,
            overruns: 0,
            skipped: 0,
        }
    }

    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Cycles whose work ran past the following wake.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Wakes dropped because entire periods had already elapsed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Sleep until the next due wake.
    ///
    /// Returns early when `stop` is raised; the caller re-checks before
    /// acting on the wake.
    pub fn wait(&mut self, clock: &dyn Clock, stop: &StopSignal) -> Wake {
        let now = clock.now();
        if self.period > Duration::ZERO && now >= self.next_wake + self.period {
            let behind = (now - self.next_wake).as_nanos() / self.period.as_nanos();
            let missed = u32::try_from(behind).unwrap_or(u32::MAX);
            self.next_wake += self.period * missed;
            self.skipped += u64::from(missed);
            tracing::warn!(
                "Scheduler fell {} period(s) behind, skipping to the next due wake",
                missed
            );
        }

        clock.sleep_until(self.next_wake, stop);

        Wake {
            cycle: self.cycle,
            scheduled: self.next_wake,
            actual: clock.now(),
        }
    }

    /// Move to the next wake, exactly one period later.
    ///
    /// Returns true if that wake is already in the past (an overrun).
    pub fn advance(&mut self, clock: &dyn Clock) -> bool {
        self.next_wake += self.period;
        self.cycle += 1;

        let now = clock.now();
        let overrun = now > self.next_wake;
        if overrun {
            self.overruns += 1;
            tracing::warn!(
                "Cycle {} overran its period by {:?}",
                self.cycle,
                now - self.next_wake
            );
        }
        overrun
    }
}
