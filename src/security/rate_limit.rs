//! Fixed-window rate limiting per client.
//!
//! # Responsibilities
//! - Count requests per client key within a fixed window
//! - Report limit, remaining and reset time for response headers
//! - Evict expired windows in the background
//!
//! # Design Decisions
//! - Sharded map: updates for one key are atomic, unrelated keys rarely contend
//! - Rejection is a normal outcome (`RateDecision::Rejected`), not an error
//! - Owned by the dispatcher; no process-global state

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Counter for a single client.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

/// Rate limit status after counting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window ends.
    pub reset_after: Duration,
}

/// Outcome of [`RateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed(RateLimitInfo),
    Rejected(RateLimitInfo),
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed(_))
    }

    pub fn info(&self) -> &RateLimitInfo {
        match self {
            RateDecision::Allowed(info) | RateDecision::Rejected(info) => info,
        }
    }

    /// Write `RateLimit-*` headers, plus `Retry-After` on rejection.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let info = self.info();
        let reset_secs = reset_seconds(info.reset_after);

        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(info.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs));
        if !self.is_allowed() {
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(reset_secs));
        }
    }
}

/// Whole seconds, rounded up, so clients never retry early.
fn reset_seconds(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Shared fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn admit(&self, key: &str) -> RateDecision {
        self.admit_at(key, Instant::now())
    }

    fn admit_at(&self, key: &str, now: Instant) -> RateDecision {
        // The entry guard holds the shard lock, so reset-or-increment is atomic per key.
        let (count, started) = {
            let mut window = self
                .windows
                .entry(key.to_string())
                .or_insert(Window { start: now, count: 0 });

            if now.duration_since(window.start) >= self.window {
                window.start = now;
                window.count = 0;
            }
            window.count = window.count.saturating_add(1);
            (window.count, window.start)
        };

        let info = RateLimitInfo {
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_after: self.window.saturating_sub(now.duration_since(started)),
        };

        if count <= self.limit {
            RateDecision::Allowed(info)
        } else {
            RateDecision::Rejected(info)
        }
    }

    /// Drop windows that have elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now.duration_since(w.start) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Periodically evict expired windows until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, tracked = self.tracked_clients(), "Expired rate limit windows evicted");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}
