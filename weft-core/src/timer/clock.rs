//! Host clock
//!
//! The reactive core never sleeps. Anything that has to happen later is
//! handed to a [`Clock`], which runs it after a delay unless it is cancelled
//! first.
//!
//! Two clocks ship with the crate:
//!
//! - [`ManualClock`] keeps virtual time that only moves when told to. Tasks
//!   run inside [`ManualClock::advance`], in deadline order.
//! - [`TokioClock`] spawns one sleeping task per timer on a tokio runtime.
//!
//! A clock must never run a task from inside `schedule`; callers rely on that
//! to schedule while holding their own state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};

/// Work scheduled on a [`Clock`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Identifies a scheduled task on the clock that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Schedule-after-delay and cancel, supplied by the host.
pub trait Clock: Send + Sync {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Drop a task that has not run yet. Unknown or finished ids are ignored.
    fn cancel(&self, id: TimerId);
}

// ----------------------------------------------------------------------------
// ManualClock
// ----------------------------------------------------------------------------

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, TimerId), Task>,
}

/// Virtual-time clock.
///
/// Time starts at zero and moves only through [`advance`](Self::advance).
/// Tasks due at the same instant run in scheduling order.
#[derive(Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Create a clock at virtual time zero with nothing scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Move time forward by `by`, running every task that falls due.
    ///
    /// Tasks scheduled by running tasks also run if they fall due before the
    /// new time. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut ran = 0;

        loop {
            let task = {
                let mut state = self.state.lock();
                let key = match state.queue.keys().next() {
                    Some(&key) if key.0 <= target => key,
                    _ => break,
                };
                state.now = key.0;
                state.queue.remove(&key)
            };
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
        ran
    }

    /// Run the tasks that are already due, without moving time.
    pub fn flush(&self) -> usize {
        self.advance(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = self.state.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let deadline = state.now + delay;
        state.queue.insert((deadline, id), task);
        tracing::trace!(timer = %id, ?deadline, "manual timer scheduled");
        id
    }

    fn cancel(&self, id: TimerId) {
        self.state.lock().queue.retain(|(_, queued), _| *queued != id);
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// TokioClock
// ----------------------------------------------------------------------------

/// Clock backed by a tokio runtime.
pub struct TokioClock {
    handle: Handle,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioClock {
    /// Schedule timers on the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(0),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| Error::NoRuntime)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Clock for TokioClock {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let timers = Arc::clone(&self.timers);

        // Held across the spawn so the task cannot deregister before it is
        // registered.
        let mut registered = self.timers.lock();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            timers.lock().remove(&id);
            task();
        });
        registered.insert(id, join.abort_handle());
        tracing::trace!(timer = %id, ?delay, "tokio timer scheduled");
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some(abort) = self.timers.lock().remove(&id) {
            abort.abort();
            tracing::trace!(timer = %id, "tokio timer cancelled");
        }
    }
}

impl fmt::Debug for TokioClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioClock")
            .field("pending", &self.pending())
            .finish()
    }
}
