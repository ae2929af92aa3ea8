//! Sliding-window rate limiting keyed by client identifier.
//!
//! Each identifier keeps the instants of its accepted requests inside the
//! current window. Rejected requests are not recorded, so a client that is
//! over the limit regains capacity as soon as its oldest accepted request
//! leaves the window.
//!
//! State is held in process memory. It resets on restart and is not shared
//! between gateway instances.

use reqwest::header::HeaderMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Identifier used when a request carries no client address headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Sliding window settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of the sliding window
    pub window: Duration,
    /// Requests accepted per identifier inside one window
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }
}

/// In-process sliding-window rate limiter.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and record a request for `identifier`.
    ///
    /// Returns `true` when the request must be rejected. Accepted requests are
    /// recorded; rejected ones are not.
    pub fn is_rate_limited(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter state lock was poisoned, continuing with recovered state");
            poisoned.into_inner()
        });

        let window = windows.entry(identifier.to_string()).or_default();
        prune(window, now, self.config.window);

        if window.len() >= self.config.max_requests {
            debug!(
                client = identifier,
                requests_in_window = window.len(),
                "Client is over the rate limit"
            );
            return true;
        }

        window.push_back(now);
        false
    }

    /// Drop identifiers with no requests left inside the window.
    ///
    /// Only bounds memory; limiting decisions do not depend on it.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = windows.len();
        windows.retain(|_, window| {
            prune(window, now, self.config.window);
            !window.is_empty()
        });
        before - windows.len()
    }

    /// Number of identifiers currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .map(|windows| windows.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}

/// Derive the rate-limit identifier for a request.
///
/// Uses the first entry of `x-forwarded-for`, then `x-real-ip`, then
/// [`UNKNOWN_CLIENT`].
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod tests;
