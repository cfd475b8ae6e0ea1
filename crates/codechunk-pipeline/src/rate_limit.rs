//! Process-wide request budget, owned and reset only by the pool manager

use codechunk_config::RateLimitConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Read-only view of the budget published to workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub requests_in_window: u64,
    pub max_per_window: u64,
    pub window_start: Instant,
    pub window: Duration,
}

impl BudgetSnapshot {
    /// Fraction of the window's requests already used
    pub fn usage(&self) -> f32 {
        if self.max_per_window == 0 {
            return 1.0;
        }
        self.requests_in_window as f32 / self.max_per_window as f32
    }

    pub fn remaining(&self) -> u64 {
        self.max_per_window.saturating_sub(self.requests_in_window)
    }

    pub fn should_throttle(&self, throttle_ratio: f32) -> bool {
        self.usage() >= throttle_ratio
    }

    pub fn resets_at(&self) -> Instant {
        self.window_start + self.window
    }

    pub fn wait_time(&self, now: Instant) -> Duration {
        self.resets_at().saturating_duration_since(now)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitBudget {
    requests_in_window: u64,
    window_start: Instant,
    max_per_window: u64,
    window: Duration,
}

impl RateLimitBudget {
    pub fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            requests_in_window: 0,
            window_start: now,
            max_per_window: config.max_requests_per_window,
            window: config.window().max(Duration::from_millis(1)),
        }
    }

    /// Count `requests` against the current window
    pub fn record(&mut self, requests: u64, now: Instant) {
        self.maybe_reset(now);
        self.requests_in_window = self.requests_in_window.saturating_add(requests);
    }

    /// Start a new window at the latest boundary not after `now`; true if reset
    pub fn maybe_reset(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return false;
        }
        let windows = (elapsed.as_nanos() / self.window.as_nanos()) as u32;
        self.window_start += self.window * windows;
        self.requests_in_window = 0;
        true
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            requests_in_window: self.requests_in_window,
            max_per_window: self.max_per_window,
            window_start: self.window_start,
            window: self.window,
        }
    }
}
