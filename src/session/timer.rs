use std::{future::Future, mem, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

/// A single-shot deadline owned by the session.
///
/// Whether a timer is pending is always readable from the value itself.
/// Dropping an armed timer detaches it; owners cancel with `disarm`.
#[derive(Debug, Default)]
pub enum Timer {
    #[default]
    Disarmed,
    Armed {
        deadline: Instant,
        task: JoinHandle<()>,
    },
}

impl Timer {
    /// Schedules `on_elapsed` to run after `delay`. `make` receives the
    /// deadline so the callback can confirm it is still the armed one.
    /// Returns false, and leaves the existing deadline alone, when already armed.
    pub fn arm<F, Fut>(&mut self, delay: Duration, make: F) -> bool
    where
        F: FnOnce(Instant) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_armed() {
            return false;
        }
        let deadline = Instant::now() + delay;
        let on_elapsed = make(deadline);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_elapsed.await;
        });
        *self = Timer::Armed { deadline, task };
        true
    }

    /// Cancels a pending deadline. Returns whether one was pending.
    pub fn disarm(&mut self) -> bool {
        match mem::take(self) {
            Timer::Armed { task, .. } => {
                task.abort();
                true
            }
            Timer::Disarmed => false,
        }
    }

    /// Called from the timer's own task once it fires: disarms without
    /// aborting the running task. Returns false when `deadline` no longer
    /// matches the armed timer (it was cancelled or replaced meanwhile).
    pub fn fired(&mut self, deadline: Instant) -> bool {
        match self {
            Timer::Armed { deadline: armed, .. } if *armed == deadline => {
                *self = Timer::Disarmed;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Timer::Armed { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Timer::Armed { deadline, .. } => Some(*deadline),
            Timer::Disarmed => None,
        }
    }
}
