use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Rate limiter that coalesces bursts of `trigger()` calls into at most one
/// callback invocation per interval.
///
/// The deferred invocation runs on a spawned tokio task, so `trigger()` must be
/// called from within a runtime.
pub struct Throttle {
    callback: Callback,
    interval: Duration,
    fire_first_immediately: bool,
    state: Arc<Mutex<ThrottleState>>,
}

#[derive(Debug, Default)]
struct ThrottleState {
    last_fired: Option<Instant>,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    deadline: Instant,
    task: JoinHandle<()>,
}

impl Throttle {
    pub fn new<F>(interval: Duration, fire_first_immediately: bool, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            interval,
            fire_first_immediately,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    /// Fires the callback now if the interval has elapsed since the last
    /// firing, otherwise makes sure exactly one firing is scheduled for the end
    /// of the current window.
    pub fn trigger(&self) {
        let now = Instant::now();
        let mut state = lock(&self.state);

        if let Some(pending) = &state.pending {
            tracing::trace!(remaining = ?pending.deadline.saturating_duration_since(now), "Throttle already scheduled, coalescing call");
            return;
        }

        let wait = match state.last_fired {
            None if self.fire_first_immediately => Duration::ZERO,
            None => self.interval,
            Some(last) => self.interval.saturating_sub(now.duration_since(last)),
        };

        if wait.is_zero() {
            state.last_fired = Some(now);
            drop(state);
            (self.callback)();
            return;
        }

        let deadline = now + wait;
        let callback = Arc::clone(&self.callback);
        let shared = Arc::clone(&self.state);
        // The lock is still held here, so the task cannot observe the slot before it is filled.
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut state = lock(&shared);
                state.pending = None;
                state.last_fired = Some(Instant::now());
            }
            callback();
        });
        state.pending = Some(Pending { deadline, task });
    }

    /// Cancels any scheduled firing and forgets the last firing time, so the
    /// next `trigger()` behaves like the first one ever made.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        if let Some(pending) = state.pending.take() {
            pending.task.abort();
        }
        state.last_fired = None;
    }

    /// Returns true while a deferred firing is scheduled.
    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("fire_first_immediately", &self.fire_first_immediately)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Drop for Throttle {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.state).pending.take() {
            pending.task.abort();
        }
    }
}

fn lock(state: &Mutex<ThrottleState>) -> MutexGuard<'_, ThrottleState> {
    // State is plain bookkeeping, still consistent after a panicking callback.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
