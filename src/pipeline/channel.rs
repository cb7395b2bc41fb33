//! Single-slot handoff channel between two pipeline stages.
//!
//! The channel holds at most one frame. A producer calling [`SlotChannel::put`]
//! blocks while the slot is occupied, a consumer calling [`SlotChannel::take`]
//! blocks while it is empty. Capacity one is the backpressure mechanism: a
//! slow downstream stage stalls its producer instead of letting frames queue
//! up, so at most one frame per channel is ever in flight.
//!
//! Each direction has its own wait condition. Producers only wait for
//! [`SlotEvent::Emptied`], consumers only for [`SlotEvent::Filled`]. Both are
//! woken together by the shutdown coordinator through [`Interruptible`].

use crate::pipeline::error::Cancelled;
use crate::pipeline::shutdown::{Interruptible, RunState};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// The two conditions a stage can wait for on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// The slot went from empty to occupied (consumer side).
    Filled,
    /// The slot went from occupied to empty (producer side).
    Emptied,
}

/// Capacity-1 synchronized mailbox.
///
/// The slot is `Some` exactly when it is occupied. All state lives behind
/// one mutex; no lock is held outside a single `put` or `take`.
pub struct SlotChannel<T> {
    name: String,
    slot: Mutex<Option<T>>,
    filled: Condvar,
    emptied: Condvar,
    run: RunState,
}

impl<T: Send> SlotChannel<T> {
    /// Create a channel observing `run` for cancellation.
    ///
    /// The channel must also be registered with the coordinator that owns
    /// `run`, otherwise blocked waiters are never woken at shutdown.
    pub fn new(name: impl Into<String>, run: RunState) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
            filled: Condvar::new(),
            emptied: Condvar::new(),
            run,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand `item` to the consumer, waiting for the slot to empty.
    ///
    /// On cancellation `item` is dropped without being stored.
    pub fn put(&self, item: T) -> Result<(), Cancelled> {
        let guard = self.lock();
        let mut slot = self.wait_for(guard, SlotEvent::Emptied)?;
        *slot = Some(item);
        self.condition(SlotEvent::Filled).notify_one();
        Ok(())
    }

    /// Remove the stored item, waiting for one to arrive.
    pub fn take(&self) -> Result<T, Cancelled> {
        let guard = self.lock();
        let mut slot = self.wait_for(guard, SlotEvent::Filled)?;
        let item = slot.take().ok_or(Cancelled)?;
        self.condition(SlotEvent::Emptied).notify_one();
        Ok(item)
    }

    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // Critical sections never run foreign code, so a poisoned lock still
        // holds a consistent slot.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn condition(&self, event: SlotEvent) -> &Condvar {
        match event {
            SlotEvent::Filled => &self.filled,
            SlotEvent::Emptied => &self.emptied,
        }
    }

    /// Block until `event` holds, re-checking the run flag before every wait
    /// and after every wake.
    fn wait_for<'a>(
        &'a self,
        mut guard: MutexGuard<'a, Option<T>>,
        event: SlotEvent,
    ) -> Result<MutexGuard<'a, Option<T>>, Cancelled> {
        loop {
            if !self.run.is_running() {
                return Err(Cancelled);
            }
            let ready = match event {
                SlotEvent::Filled => guard.is_some(),
                SlotEvent::Emptied => guard.is_none(),
            };
            if ready {
                return Ok(guard);
            }
            guard = self
                .condition(event)
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T: Send> Interruptible for SlotChannel<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn interrupt(&self) {
        let _guard = self.lock();
        self.filled.notify_all();
        self.emptied.notify_all();
    }
}
