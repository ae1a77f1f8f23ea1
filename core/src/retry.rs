//! Bounded retry with a fixed delay between attempts.
//!
//! # Design
//! The loop is an explicit state machine so cancellation can be observed at
//! both places a request waits: before an attempt and during the delay.
//!
//! ```text
//! Attempting(n) --ok--> Succeeded
//! Attempting(n) --err, n < max--> Delaying(n) --delay elapsed--> Attempting(n + 1)
//! Attempting(n) --err, n = max--> Exhausted
//! ```

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancelToken;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// State of a single retried operation.
#[derive(Debug)]
enum RetryState<T, E> {
    Attempting(u32),
    Delaying(u32, E),
    Succeeded(u32, T),
    Exhausted(u32, E),
}

/// Final result of `run`.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: E, attempts: u32 },
    Cancelled { attempts: u32, last_error: Option<E> },
}

/// Run `op` until it succeeds, the policy runs out, or `cancel` fires.
///
/// `op` receives the 1-based attempt number.
pub fn run<T, E, F>(policy: &RetryPolicy, cancel: Option<&CancelToken>, mut op: F) -> RetryOutcome<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts();
    let mut last_error = None;
    let mut state = RetryState::Attempting(1);

    loop {
        state = match state {
            RetryState::Attempting(attempt) => {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    debug!(attempt, "cancelled before attempt");
                    return RetryOutcome::Cancelled {
                        attempts: attempt - 1,
                        last_error,
                    };
                }
                debug!(attempt, max_attempts, "attempting");
                match op(attempt) {
                    Ok(value) => RetryState::Succeeded(attempt, value),
                    Err(error) if attempt < max_attempts => RetryState::Delaying(attempt, error),
                    Err(error) => RetryState::Exhausted(attempt, error),
                }
            }
            RetryState::Delaying(attempt, error) => {
                warn!(attempt, max_attempts, delay = ?policy.delay, %error, "attempt failed, retrying");
                last_error = Some(error);
                let slept = match cancel {
                    Some(token) => token.sleep(policy.delay),
                    None => {
                        thread::sleep(policy.delay);
                        true
                    }
                };
                if !slept {
                    debug!(attempt, "cancelled during retry delay");
                    return RetryOutcome::Cancelled {
                        attempts: attempt,
                        last_error,
                    };
                }
                RetryState::Attempting(attempt + 1)
            }
            RetryState::Succeeded(attempts, value) => {
                return RetryOutcome::Succeeded { value, attempts };
            }
            RetryState::Exhausted(attempts, error) => {
                debug!(attempts, %error, "retries exhausted");
                return RetryOutcome::Exhausted { error, attempts };
            }
        };
    }
}
