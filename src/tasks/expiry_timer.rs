//! Expiry Timer Task
//!
//! A single coalesced wake-up aligned to the earliest deadline in the cache.
//! At most one wake-up is pending at any time; arming a new one aborts the
//! previous task.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Shortest delay between arming and firing.
pub const MIN_TIMER_DELAY: Duration = Duration::from_millis(10);

// == Expiry Timer ==
/// Owner of the pending wake-up, Idle or Armed.
#[derive(Debug)]
pub struct ExpiryTimer {
    /// Runtime the wake-up tasks are spawned on
    runtime: Option<Handle>,
    /// Pending wake-up, None when idle
    armed: Option<ArmedTimer>,
    /// Incremented on every arm; identifies the current wake-up
    generation: u64,
}

#[derive(Debug)]
struct ArmedTimer {
    deadline: Instant,
    generation: u64,
    task: JoinHandle<()>,
}

impl ExpiryTimer {
    // == Constructor ==
    /// Creates an idle timer spawning on `runtime`.
    ///
    /// Without a runtime the timer can never be armed.
    pub fn new(runtime: Option<Handle>) -> Self {
        Self {
            runtime,
            armed: None,
            generation: 0,
        }
    }

    /// Deadline of the pending wake-up, None when idle.
    pub fn armed_deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|armed| armed.deadline)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    // == Arm ==
    /// Schedules `on_fire` for `deadline`, replacing any pending wake-up.
    ///
    /// The task sleeps for `max(MIN_TIMER_DELAY, deadline - now)` and then
    /// calls `on_fire` with the generation it was armed under. Returns false
    /// if no runtime is available.
    pub fn arm<F>(&mut self, deadline: Instant, now: Instant, on_fire: F) -> bool
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.disarm();

        let Some(runtime) = self.runtime.as_ref() else {
            debug!("No runtime available, expiry timer stays idle");
            return false;
        };

        self.generation += 1;
        let generation = self.generation;
        let wake_at = deadline.max(now + MIN_TIMER_DELAY);

        let task = runtime.spawn(async move {
            tokio::time::sleep_until(wake_at).await;
            on_fire(generation);
        });

        debug!(
            generation,
            delay_ms = wake_at.saturating_duration_since(now).as_millis() as u64,
            "Expiry timer armed"
        );

        self.armed = Some(ArmedTimer {
            deadline,
            generation,
            task,
        });
        true
    }

    // == Disarm ==
    /// Cancels the pending wake-up, if any.
    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
            debug!(generation = armed.generation, "Expiry timer disarmed");
        }
    }

    // == Fired ==
    /// Called from a wake-up task. Returns true and returns to idle if
    /// `generation` is the pending wake-up; false for a stale one.
    pub fn fired(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
