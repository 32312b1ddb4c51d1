//! Debounce window over a [`TimerDriver`].
//!
//! Re-arming replaces the previously scheduled timer, so only the last burst
//! entry fires. Ids are claimed on delivery: a fire that races a re-arm or
//! cancellation carries a stale id and is rejected by [`Debouncer::try_claim`].

use std::sync::Arc;
use std::time::Duration;

use crate::schedule::{TaskId, TimerDriver};

pub struct Debouncer {
    timers: Arc<dyn TimerDriver>,
    delay: Duration,
    armed: Option<TaskId>,
}

impl Debouncer {
    pub fn new(timers: Arc<dyn TimerDriver>, delay: Duration) -> Self {
        Self {
            timers,
            delay,
            armed: None,
        }
    }

    /// Schedules the window, replacing any timer already armed.
    pub fn debounce(&mut self) -> TaskId {
        if let Some(previous) = self.armed.take() {
            self.timers.cancel(previous);
        }
        let id = self.timers.schedule(self.delay);
        self.armed = Some(id);
        id
    }

    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            self.timers.cancel(armed);
        }
    }

    pub fn is_active(&self) -> bool {
        self.armed.is_some()
    }

    /// Accepts a fired id if it is the one currently armed, disarming the
    /// window. Stale ids return false and must be ignored by the caller.
    pub fn try_claim(&mut self, id: TaskId) -> bool {
        if self.armed == Some(id) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}
