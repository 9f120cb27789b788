//! Local rate governor driven by the server-reported remaining quota.
//!
//! This is an optimistic estimator, not a token bucket: it only reacts once a
//! response has told it how much budget is left, so the first burst of a new
//! window is never throttled up front.

use crate::config::RateLimitConfig;
use crate::retry::Sleeper;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Header both services use to report the remaining request budget.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Per-service request budget tracker.
pub struct RateGovernor {
    name: &'static str,
    remaining: u32,
    ceiling: u32,
    low_water: u32,
    window: Duration,
    last_request: Option<Instant>,
    sleeper: Arc<dyn Sleeper>,
}

impl RateGovernor {
    /// Creates a governor that starts with a full budget.
    pub fn new(name: &'static str, config: &RateLimitConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            name,
            remaining: config.ceiling,
            ceiling: config.ceiling,
            low_water: config.low_water,
            window: Duration::from_secs(config.window_sec),
            last_request: None,
            sleeper,
        }
    }

    /// Last known remaining budget.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Records a response: picks up the remaining-quota header if present
    /// and stamps the request time.
    pub fn observe(&mut self, headers: &HeaderMap) {
        if let Some(remaining) = headers
            .get(REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.remaining = remaining;
        }
        self.last_request = Some(Instant::now());
    }

    /// Called before every outbound request. Waits out the rest of the
    /// window when the budget has dropped to the low-water mark.
    pub async fn admit(&mut self) {
        if self.remaining > self.low_water {
            return;
        }

        let Some(last) = self.last_request else {
            return;
        };

        let Some(wait) = self.window.checked_sub(last.elapsed()) else {
            debug!(
                service = self.name,
                remaining = self.remaining,
                "window already elapsed, not waiting"
            );
            return;
        };

        if wait.is_zero() {
            return;
        }

        info!(
            service = self.name,
            remaining = self.remaining,
            "approaching rate limit, waiting {:.1}s",
            wait.as_secs_f64()
        );
        self.sleeper.sleep(wait).await;
        self.remaining = self.ceiling;
        self.last_request = Some(Instant::now());
    }
}
