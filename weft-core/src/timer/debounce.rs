//! DebouncingTimer
//!
//! Coalesces bursts of calls into one delayed execution. Every call cancels
//! the execution still pending from the previous call and schedules its own.
//!
//! The very first call a timer ever receives uses `first_delay` instead of
//! `delay`. The call counter is never reset, so `first_delay` applies once
//! per timer lifetime, not once per idle period.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::clock::{Clock, TimerId};
use crate::config::DebounceConfig;

#[derive(Debug, Default)]
struct DebounceState {
    calls: u64,
    /// Bumped by every `invoke` and `cancel`. A run only goes ahead if the
    /// epoch it was scheduled under is still current.
    epoch: u64,
    pending: Option<TimerId>,
}

/// Reusable debouncer over a host [`Clock`].
pub struct DebouncingTimer {
    clock: Arc<dyn Clock>,
    delay: Duration,
    first_delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl DebouncingTimer {
    /// Create a timer that waits `first_delay` on its very first call and
    /// `delay` on every later one.
    pub fn new(clock: Arc<dyn Clock>, delay: Duration, first_delay: Duration) -> Self {
        Self {
            clock,
            delay,
            first_delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Create a timer with the delays from `config`.
    pub fn from_config(clock: Arc<dyn Clock>, config: &DebounceConfig) -> Self {
        Self::new(clock, config.delay(), config.first_delay())
    }

    /// Delay applied to every call after the first.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Delay applied to the first call.
    pub fn first_delay(&self) -> Duration {
        self.first_delay
    }

    /// Schedule `block`, replacing whatever is still pending.
    ///
    /// A replaced run never executes, even if the clock could not cancel it
    /// in time.
    pub fn invoke<F>(&self, block: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        state.calls += 1;
        state.epoch += 1;
        let epoch = state.epoch;

        let delay = if state.calls == 1 {
            self.first_delay
        } else {
            if let Some(pending) = state.pending.take() {
                self.clock.cancel(pending);
                tracing::trace!(timer = %pending, "debounced run replaced");
            }
            self.delay
        };

        let slot = Arc::downgrade(&self.state);
        let id = self.clock.schedule(
            delay,
            Box::new(move || {
                if let Some(slot) = slot.upgrade() {
                    let mut state = slot.lock();
                    if state.epoch != epoch {
                        tracing::trace!("superseded debounced run skipped");
                        return;
                    }
                    state.pending = None;
                }
                block();
            }),
        );
        state.pending = Some(id);
    }

    /// Drop the pending execution, if any.
    pub fn cancel(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.pending.take()
        };
        if let Some(pending) = pending {
            self.clock.cancel(pending);
        }
    }

    /// Whether an execution is scheduled and has not run yet.
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Total number of calls to [`invoke`](Self::invoke).
    pub fn invocations(&self) -> u64 {
        self.state.lock().calls
    }
}

impl fmt::Debug for DebouncingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DebouncingTimer")
            .field("delay", &self.delay)
            .field("first_delay", &self.first_delay)
            .field("calls", &state.calls)
            .field("pending", &state.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counter() -> (Arc<AtomicI32>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicI32::new(0));
        let make = {
            let count = Arc::clone(&count);
            move || {
                let count = Arc::clone(&count);
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (count, make)
    }

    #[test]
    fn burst_runs_once_after_last_call() {
        let clock = Arc::new(ManualClock::new());
        let timer = DebouncingTimer::new(clock.clone(), ms(100), ms(10));
        let (count, block) = counter();

        timer.invoke(block());
        clock.advance(ms(3));
        timer.invoke(block());

        clock.advance(ms(9)); // t = 12, first deadline passed but was replaced
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(timer.is_pending());

        clock.advance(ms(90)); // t = 102
        assert_eq!(count.load(Ordering::SeqCst), 0);

        clock.advance(ms(1)); // t = 103
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());

        clock.advance(ms(1000));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_call_uses_first_delay() {
        let clock = Arc::new(ManualClock::new());
        let timer = DebouncingTimer::new(clock.clone(), ms(100), ms(10));
        let (count, block) = counter();

        timer.invoke(block());
        clock.advance(ms(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_delay_applies_once_per_lifetime() {
        let clock = Arc::new(ManualClock::new());
        let timer = DebouncingTimer::new(clock.clone(), ms(100), ms(10));
        let (count, block) = counter();

        timer.invoke(block());
        clock.advance(ms(500));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A new burst after a long idle period still uses the regular delay.
        timer.invoke(block());
        clock.advance(ms(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        clock.advance(ms(90));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(timer.invocations(), 2);
    }

    #[test]
    fn cancel_drops_pending_run() {
        let clock = Arc::new(ManualClock::new());
        let timer = DebouncingTimer::new(clock.clone(), ms(100), ms(10));
        let (count, block) = counter();

        timer.invoke(block());
        timer.cancel();
        timer.cancel();
        clock.advance(ms(1000));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn only_one_execution_outstanding() {
        let clock = Arc::new(ManualClock::new());
        let timer = DebouncingTimer::new(clock.clone(), ms(100), ms(10));
        let (_, block) = counter();

        for _ in 0..20 {
            timer.invoke(block());
            assert_eq!(clock.pending(), 1);
        }
    }

    #[test]
    fn built_from_config() {
        let clock = Arc::new(ManualClock::new());
        let config = DebounceConfig {
            delay_ms: 40,
            first_delay_ms: 5,
        };
        let timer = DebouncingTimer::from_config(clock.clone(), &config);
        let (count, block) = counter();

        timer.invoke(block());
        clock.advance(ms(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    /// A clock whose `cancel` always arrives too late.
    struct LateCancelClock(ManualClock);

    impl Clock for LateCancelClock {
        fn schedule(&self, delay: Duration, task: crate::timer::Task) -> TimerId {
            self.0.schedule(delay, task)
        }

        fn cancel(&self, _id: TimerId) {}
    }

    #[test]
    fn superseded_run_is_skipped_when_cancel_loses_the_race() {
        let clock = Arc::new(LateCancelClock(ManualClock::new()));
        let timer = DebouncingTimer::new(clock.clone(), ms(10), ms(10));
        let (count, block) = counter();

        timer.invoke(block());
        timer.invoke(block());
        clock.0.advance(ms(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());

        timer.invoke(block());
        timer.cancel();
        clock.0.advance(ms(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounces_on_tokio_clock() {
        let clock = Arc::new(crate::timer::TokioClock::current().unwrap());
        let timer = DebouncingTimer::new(clock, ms(100), ms(10));
        let (count, block) = counter();

        timer.invoke(block());
        tokio::time::sleep(ms(3)).await;
        timer.invoke(block());

        tokio::time::sleep(ms(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(ms(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
