//! Request rate limiting.
//!
//! Two policies live here:
//! - [`SlidingWindowLimiter`] bounds outbound calls to the upstream API.
//! - [`FixedWindowLimiter`] bounds inbound requests per client key, grouped by
//!   [`EndpointClass`] in [`EndpointRateLimiter`].
//!
//! Both fail fast. Nothing is queued and every key has an independent window.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{RateLimitConfig, WindowLimit};

/// Sliding window of request instants per key.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `key` and returns whether it may proceed.
    ///
    /// Denied requests are not recorded.
    pub fn can_make_request(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let timestamps = requests.entry(key.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_requests
    }
}

/// Outcome of an inbound rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Time until the current window ends.
    pub reset_in: Duration,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_in.as_secs();
        if self.reset_in.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed window counter per key.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: WindowLimit,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(limit: WindowLimit) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let max = self.limit.requests;

        let window = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            let window = windows
                .entry(key.to_string())
                .and_modify(|w| {
                    if now >= w.reset_at {
                        *w = RateLimitWindow {
                            count: 1,
                            reset_at: now + self.limit.window(),
                        };
                    } else {
                        w.count = w.count.saturating_add(1);
                    }
                })
                .or_insert_with(|| RateLimitWindow {
                    count: 1,
                    reset_at: now + self.limit.window(),
                });
            *window
        };

        let reset_in = window.reset_at.saturating_duration_since(now);
        let reset_at = Utc::now()
            + chrono::Duration::from_std(reset_in).unwrap_or_else(|_| chrono::Duration::zero());

        RateLimitDecision {
            allowed: window.count <= max,
            limit: max,
            used: window.count,
            remaining: max.saturating_sub(window.count),
            reset_at,
            reset_in,
        }
    }

    /// Drops windows that have ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, w| now < w.reset_at);
        before - windows.len()
    }

    #[must_use]
    pub const fn limit(&self) -> WindowLimit {
        self.limit
    }
}

/// Named inbound policy shared by a group of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Global,
    Fpl,
    Admin,
    Registration,
}

impl EndpointClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Fpl => "fpl",
            Self::Admin => "admin",
            Self::Registration => "registration",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fixed-window limiter per endpoint class.
#[derive(Debug)]
pub struct EndpointRateLimiter {
    global: FixedWindowLimiter,
    fpl: FixedWindowLimiter,
    admin: FixedWindowLimiter,
    registration: FixedWindowLimiter,
}

impl EndpointRateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            global: FixedWindowLimiter::new(config.global),
            fpl: FixedWindowLimiter::new(config.fpl),
            admin: FixedWindowLimiter::new(config.admin),
            registration: FixedWindowLimiter::new(config.registration),
        }
    }

    #[must_use]
    pub const fn limiter(&self, class: EndpointClass) -> &FixedWindowLimiter {
        match class {
            EndpointClass::Global => &self.global,
            EndpointClass::Fpl => &self.fpl,
            EndpointClass::Admin => &self.admin,
            EndpointClass::Registration => &self.registration,
        }
    }

    pub fn check(&self, class: EndpointClass, key: &str) -> RateLimitDecision {
        let decision = self.limiter(class).check(key);
        if !decision.allowed {
            metrics::counter!("rate_limit_denied_total", "class" => class.as_str()).increment(1);
        }
        decision
    }

    pub fn purge_expired(&self) -> usize {
        [
            EndpointClass::Global,
            EndpointClass::Fpl,
            EndpointClass::Admin,
            EndpointClass::Registration,
        ]
        .into_iter()
        .map(|class| self.limiter(class).purge_expired())
        .sum()
    }
}
