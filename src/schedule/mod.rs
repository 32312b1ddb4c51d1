//! Cancellable one-shot timers backing the connector's debounce windows.
//!
//! The connector never sleeps; it schedules a task and keeps going. When the
//! delay elapses the driver hands the fired [`TaskId`] back to the host, which
//! forwards it into `DataConnector::on_timer`. A cancelled task never fires.
//!
//! Two drivers ship with the crate: [`TokioTimers`] for async hosts and
//! [`ManualTimers`] for deterministic tests and synchronous hosts that pump
//! timers themselves.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

pub type TaskId = u64;

pub trait TimerDriver: Send + Sync {
    /// Schedules a one-shot task and returns its id.
    fn schedule(&self, delay: Duration) -> TaskId;

    /// Cancels a scheduled task. Cancelling an already-fired or unknown id is
    /// a no-op.
    fn cancel(&self, id: TaskId);
}

/// Timer driver for tokio hosts. Each scheduled task is a spawned sleep that
/// sends its id on the channel returned by [`TokioTimers::new`]; the host
/// receives ids there and forwards them to the connector.
///
/// `schedule` must be called from within a tokio runtime context.
pub struct TokioTimers {
    inner: Arc<Mutex<TokioInner>>,
    fired_tx: mpsc::UnboundedSender<TaskId>,
}

#[derive(Default)]
struct TokioInner {
    next_id: TaskId,
    tasks: HashMap<TaskId, tokio::task::JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TaskId>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let timers = Arc::new(Self {
            inner: Arc::new(Mutex::new(TokioInner {
                next_id: 1,
                tasks: HashMap::new(),
            })),
            fired_tx,
        });
        (timers, fired_rx)
    }
}

impl TimerDriver for TokioTimers {
    fn schedule(&self, delay: Duration) -> TaskId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let registry = Arc::clone(&self.inner);
        let fired_tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.lock().tasks.remove(&id);
            let _ = fired_tx.send(id);
        });
        inner.tasks.insert(id, handle);
        id
    }

    fn cancel(&self, id: TaskId) {
        if let Some(handle) = self.inner.lock().tasks.remove(&id) {
            handle.abort();
        }
    }
}

/// A timer scheduled on [`ManualTimers`], waiting to be fired by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub id: TaskId,
    pub delay: Duration,
}

/// Deterministic driver: scheduling records an entry, cancelling removes it,
/// and the host drains and fires entries whenever it chooses. No executor is
/// involved, which makes connector behavior fully reproducible in tests.
#[derive(Debug, Default)]
pub struct ManualTimers {
    inner: Mutex<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    next_id: TaskId,
    pending: Vec<ScheduledTimer>,
}

impl ManualTimers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pending(&self) -> Vec<ScheduledTimer> {
        self.inner.lock().pending.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    /// Removes and returns everything currently scheduled, in scheduling
    /// order. The caller decides which ids actually fire.
    pub fn drain(&self) -> Vec<ScheduledTimer> {
        std::mem::take(&mut self.inner.lock().pending)
    }
}

impl TimerDriver for ManualTimers {
    fn schedule(&self, delay: Duration) -> TaskId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.pending.push(ScheduledTimer { id, delay });
        id
    }

    fn cancel(&self, id: TaskId) {
        self.inner.lock().pending.retain(|timer| timer.id != id);
    }
}
