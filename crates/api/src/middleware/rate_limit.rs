//! Rate limiting middleware.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token bucket rate limiter keyed by client identity.
///
/// One mutex guards the whole bucket map; bucket operations are in-memory
/// and short, so contention at the expected key cardinality is negligible.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    config: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Refill rate in tokens per second
    #[serde(default = "default_rps")]
    pub rps: f64,
    /// Burst size (bucket capacity)
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_rps() -> f64 {
    20.0
}

fn default_burst() -> u32 {
    40
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rps: default_rps(),
            burst: default_burst(),
        }
    }
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self, cost: u32, rps: f64, burst: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        // Replenish tokens, capped at capacity
        self.tokens = (self.tokens + elapsed * rps).min(burst as f64);

        // A request either obtains `cost` tokens or leaves the balance
        // unchanged
        if self.tokens >= cost as f64 {
            self.tokens -= cost as f64;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Try to acquire `cost` tokens for the given key.
    ///
    /// The bucket is created lazily on a key's first request, starting
    /// full.
    pub fn allow(&self, key: &str, cost: u32) -> bool {
        let mut buckets = self.buckets.lock();

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.burst));

        bucket.try_acquire(cost, self.config.rps, self.config.burst)
    }

    /// Check if a single request is allowed for the given key.
    pub fn check(&self, key: &str) -> bool {
        self.allow(key, 1)
    }

    /// Evict buckets idle longer than `max_age`.
    ///
    /// An idle bucket refills to capacity within `burst / rps` seconds, so
    /// dropping one and recreating it fresh admits exactly the same
    /// traffic; eviction only bounds memory.
    pub fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < max_age);
    }

    /// Number of live buckets (tests and diagnostics).
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;
