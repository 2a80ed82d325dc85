//! Sliding-window message rate limiting for live connections.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rate limiter using a sliding window algorithm
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Timestamps of recent messages
    timestamps: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Allow `max_requests` messages per `window`.
    ///
    /// ```
    /// use live_ranking::live::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
    /// assert!(limiter.check());
    /// assert!(limiter.check());
    /// assert!(!limiter.check());
    /// ```
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    /// 10 messages per second
    pub fn burst() -> Self {
        Self::new(10, Duration::from_secs(1))
    }

    /// 100 messages per minute
    pub fn sustained() -> Self {
        Self::new(100, Duration::from_secs(60))
    }

    /// Record a message if the window has room; `false` when over the limit.
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> bool {
        while let Some(ts) = self.timestamps.front() {
            if now.duration_since(*ts) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() >= self.max_requests {
            return false;
        }

        self.timestamps.push_back(now);
        true
    }

    pub fn remaining(&self) -> usize {
        self.max_requests.saturating_sub(self.timestamps.len())
    }
}

/// Which window rejected a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitExceeded {
    Burst,
    Sustained,
}

impl RateLimitExceeded {
    pub fn client_message(self) -> &'static str {
        match self {
            RateLimitExceeded::Burst => "Rate limit exceeded. Please slow down.",
            RateLimitExceeded::Sustained => "Too many messages. Please wait before sending more.",
        }
    }
}

/// Burst and sustained windows applied together to one connection
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    burst: RateLimiter,
    sustained: RateLimiter,
}

impl Default for ConnectionLimiter {
    fn default() -> Self {
        Self::new(RateLimiter::burst(), RateLimiter::sustained())
    }
}

impl ConnectionLimiter {
    pub fn new(burst: RateLimiter, sustained: RateLimiter) -> Self {
        Self { burst, sustained }
    }

    pub fn check(&mut self) -> Result<(), RateLimitExceeded> {
        if !self.burst.check() {
            return Err(RateLimitExceeded::Burst);
        }
        if !self.sustained.check() {
            return Err(RateLimitExceeded::Sustained);
        }
        Ok(())
    }
}
