use std::time::Duration;

use tokio::time::sleep;

/// A fixed number of attempts with a fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: usize, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// A fresh schedule for one retried action.
    pub fn schedule(&self) -> Schedule {
        Schedule {
            policy: *self,
            attempt: 0,
        }
    }
}

/// Hands out attempt numbers, sleeping the backoff before every attempt but the first.
///
/// ```ignore
/// let mut schedule = policy.schedule();
/// while let Some(attempt) = schedule.next().await {
///     if let Some(done) = try_once(attempt).await? {
///         return Ok(Some(done));
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Schedule {
    policy: RetryPolicy,
    attempt: usize,
}

impl Schedule {
    /// The 1-based number of the next attempt, or `None` once the policy is exhausted.
    pub async fn next(&mut self) -> Option<usize> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        if self.attempt > 0 {
            sleep(self.policy.backoff).await;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    /// Attempts handed out so far.
    pub fn attempts(&self) -> usize {
        self.attempt
    }

    pub fn remaining(&self) -> usize {
        self.policy.max_attempts - self.attempt
    }
}
