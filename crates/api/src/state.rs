//! Application state shared across handlers.

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};
use event_store::EventStore;
use std::sync::Arc;
use std::time::Duration;

/// How often the bucket sweep runs.
const RATE_LIMITER_CLEANUP_PERIOD: Duration = Duration::from_secs(300);

/// Idle age after which a bucket is evicted. An evicted bucket is
/// indistinguishable from a fresh one by then, so the sweep only bounds
/// memory, never admission decisions.
const RATE_LIMITER_BUCKET_TTL: Duration = Duration::from_secs(3600);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Event store (Postgres in production, in-memory in tests)
    pub store: Arc<dyn EventStore>,
    /// Rate limiter, consulted before any ingestion work
    pub rate_limiter: SharedRateLimiter,
    /// Maximum rows per ingestion batch
    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, max_batch_size: usize) -> Self {
        Self::with_rate_limit(store, max_batch_size, RateLimitConfig::default())
    }

    /// Create with custom rate limit config.
    pub fn with_rate_limit(
        store: Arc<dyn EventStore>,
        max_batch_size: usize,
        rate_config: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            rate_limiter: Arc::new(RateLimiter::new(rate_config)),
            max_batch_size,
        }
    }

    /// Start the rate limiter cleanup background task.
    /// Returns a handle that can be used to cancel the task.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMITER_CLEANUP_PERIOD);
            loop {
                interval.tick().await;
                rate_limiter.cleanup(RATE_LIMITER_BUCKET_TTL);
            }
        })
    }
}
