//! Cooperative cancellation for in-progress requests.
//!
//! A `CancelToken` is cloned into whatever needs to abort a request. The
//! retry loop checks it before each attempt and waits on it during the retry
//! delay, so `cancel()` wakes a sleeping request immediately. An optional
//! deadline also caps the timeout of every attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
    deadline: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(deadline),
                ..Default::default()
            }),
        }
    }

    /// A timeout too large to represent as an `Instant` means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    pub fn cancel(&self) {
        *self.inner.cancelled.lock() = true;
        self.inner.wake.notify_all();
    }

    /// True once `cancel` was called or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock() || self.remaining() == Some(Duration::ZERO)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Block for `duration` or until cancelled. Returns `false` if cancelled
    /// or the deadline cut the sleep short. A duration too large to represent
    /// waits until cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let wake_at = Instant::now().checked_add(duration);
        let until = match (wake_at, self.inner.deadline) {
            (Some(wake_at), Some(deadline)) => Some(wake_at.min(deadline)),
            (wake_at, deadline) => wake_at.or(deadline),
        };

        let mut cancelled = self.inner.cancelled.lock();
        match until {
            Some(until) => {
                while !*cancelled {
                    if self.inner.wake.wait_until(&mut cancelled, until).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while !*cancelled {
                    self.inner.wake.wait(&mut cancelled);
                }
            }
        }
        let cancelled = *cancelled;
        !cancelled && until.is_some() && until == wake_at
    }
}
