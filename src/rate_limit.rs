//! Rate limiting for store search requests
//!
//! The search service limits request rates per client, so every request of a
//! run (including truncation retries) passes through one shared `Throttle`.
//! Two policies are provided: a fixed delay between consecutive requests and
//! a token bucket.

use async_trait::async_trait;
use std::sync::{Arc, Mutex as SlotMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use crate::config::{RateLimitConfig, RateLimitStrategy};

/// Gate that every search request passes before it is sent.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Wait until the next request may be sent.
    async fn acquire(&self);

    /// Called once the response (or failure) of an acquired request arrived.
    async fn release(&self) {}

    /// Human readable description for start-up logging
    fn describe(&self) -> String;
}

/// A token bucket rate limiter for controlling request rates
#[derive(Debug)]
pub struct RateLimiter {
    /// Tokens available in the bucket
    tokens: f64,
    /// Maximum tokens (bucket capacity)
    max_tokens: f64,
    /// Tokens added per second (refill rate)
    refill_rate: f64,
    /// Last time tokens were updated
    last_update: Instant,
    /// Whether rate limiting is enabled (false if rate is 0/unlimited)
    enabled: bool,
}

impl RateLimiter {
    /// Create a new rate limiter allowing `requests_per_second` with bursts of
    /// up to `burst` requests. A rate of 0 (or a non-finite rate) disables
    /// limiting.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let enabled = requests_per_second.is_finite() && requests_per_second > 0.0;
        let max_tokens = if enabled {
            burst.max(1) as f64
        } else {
            f64::INFINITY
        };

        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: requests_per_second.max(0.0),
            last_update: Instant::now(),
            enabled,
        }
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_update = now;
    }

    /// Try to acquire a token, returning time to wait if not available
    pub fn try_acquire(&mut self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }

        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let wait_secs = (1.0 - self.tokens) / self.refill_rate;
            Some(Duration::try_from_secs_f64(wait_secs).unwrap_or(Duration::MAX))
        }
    }

    /// Acquire a token, waiting if necessary
    pub async fn acquire(&mut self) {
        loop {
            match self.try_acquire() {
                None => return,
                Some(wait_duration) => {
                    debug!("Rate limiter waiting {:?} for token", wait_duration);
                    sleep(wait_duration).await;
                    // Re-check after sleep; rounding can leave the bucket just short of a token
                }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Thread-safe token bucket shared by all workers of a run
#[derive(Debug, Clone)]
pub struct SharedRateLimiter {
    inner: Arc<Mutex<RateLimiter>>,
    requests_per_second: f64,
    burst: u32,
}

impl SharedRateLimiter {
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiter::new(requests_per_second, burst))),
            requests_per_second,
            burst,
        }
    }

    pub async fn is_enabled(&self) -> bool {
        let limiter = self.inner.lock().await;
        limiter.enabled
    }
}

#[async_trait]
impl Throttle for SharedRateLimiter {
    async fn acquire(&self) {
        let mut limiter = self.inner.lock().await;
        limiter.acquire().await;
    }

    fn describe(&self) -> String {
        if self.requests_per_second > 0.0 {
            format!("token bucket, {} req/s, burst {}", self.requests_per_second, self.burst)
        } else {
            "unlimited".to_string()
        }
    }
}

/// Waits a fixed delay after every response before the next request, across
/// all workers. Consecutive request starts are also at least one delay apart.
/// The first request is sent immediately.
#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    /// Callers queue here while waiting for the next slot
    queue: Mutex<()>,
    next_slot: SlotMutex<Option<Instant>>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            queue: Mutex::new(()),
            next_slot: SlotMutex::new(None),
        }
    }

    fn current_slot(&self) -> Option<Instant> {
        *self.next_slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move the next slot to at least `slot`
    fn push_slot(&self, slot: Instant) {
        let mut next_slot = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());
        *next_slot = Some(next_slot.map_or(slot, |current| current.max(slot)));
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn acquire(&self) {
        if self.delay.is_zero() {
            return;
        }

        let _turn = self.queue.lock().await;
        // A response arriving while we sleep can push the slot further out
        while let Some(slot) = self.current_slot() {
            if slot <= Instant::now() {
                break;
            }
            debug!("Waiting {:?} before next request", slot - Instant::now());
            sleep_until(slot).await;
        }
        self.push_slot(Instant::now() + self.delay);
    }

    async fn release(&self) {
        if self.delay.is_zero() {
            return;
        }
        self.push_slot(Instant::now() + self.delay);
    }

    fn describe(&self) -> String {
        if self.delay.is_zero() {
            "unlimited".to_string()
        } else {
            format!("fixed delay of {:.1}s between requests", self.delay.as_secs_f64())
        }
    }
}

/// Build the throttle selected in the configuration.
pub fn throttle_from_config(config: &RateLimitConfig) -> Arc<dyn Throttle> {
    match config.strategy {
        RateLimitStrategy::FixedDelay => {
            Arc::new(FixedDelay::new(Duration::from_millis(config.request_delay_ms)))
        }
        RateLimitStrategy::TokenBucket => {
            Arc::new(SharedRateLimiter::new(config.requests_per_second, config.burst))
        }
    }
}
