//! # Feature: Rate Limiting
//!
//! Caps outbound SMS per recipient with a sliding window. Uses DashMap for
//! thread-safe concurrent access from reminder timer tasks.
//!
//! - **Version**: 2.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.1.0: Expired recipients are swept from `check_rate_limit` once per window
//! - 2.0.0: Keyed by recipient phone number for SMS throttling
//! - 1.0.0: Initial release with sliding window rate limiting

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub struct RateLimiter {
    requests: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
    last_purge: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
            last_purge: Mutex::new(Instant::now()),
        }
    }

    /// Record a request for `key` if it is under the limit
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();

        // Must run before the entry guard below is taken; retain locks every shard
        self.purge_if_due(now);

        let mut entry = self.requests.entry(key.to_string()).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    /// Time until `key` may send again, zero when it is under the limit
    pub fn retry_after(&self, key: &str) -> Duration {
        let Some(entry) = self.requests.get(key) else {
            return Duration::ZERO;
        };
        if entry.len() < self.max_requests {
            return Duration::ZERO;
        }
        entry
            .first()
            .map(|oldest| self.time_window.saturating_sub(oldest.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    fn purge_if_due(&self, now: Instant) {
        let due = {
            let mut last = self
                .last_purge
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if now.duration_since(*last) >= self.time_window {
                *last = now;
                true
            } else {
                false
            }
        };
        if due {
            self.purge_expired();
        }
    }

    /// Drop keys whose window has fully elapsed
    pub fn purge_expired(&self) {
        let window = self.time_window;
        self.requests
            .retain(|_, times| times.last().is_some_and(|t| t.elapsed() < window));
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}
