//! Retry policy for throttled requests and the sleep abstraction behind it.
//!
//! Every delay in the crate (429 cooldowns, rate governor waits, pacing
//! between items) goes through a [`Sleeper`] so tests can record waits
//! instead of spending them.

use async_trait::async_trait;
use std::time::Duration;

/// Something that can wait for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested waits and returns immediately.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    waits: std::sync::Arc<std::sync::Mutex<Vec<Duration>>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every wait requested so far, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

/// Fixed-cooldown retry policy for 429 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Wait between a 429 and the next attempt.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            cooldown,
        }
    }

    /// Returns true when `status` is worth retrying at all.
    pub fn is_retryable(&self, status: u16) -> bool {
        status == 429
    }

    /// Decides what to do after attempt number `attempt` (1-based) came back
    /// throttled: `Some(delay)` to wait and retry, `None` when the budget is
    /// spent.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts {
            Some(self.cooldown)
        } else {
            None
        }
    }
}
