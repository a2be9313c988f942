//! Per-client-IP rate limiting for the redemption endpoint.
//!
//! Codes are bearer secrets, so unthrottled callers could enumerate them.
//! Each client IP gets a token bucket refilled at `rate_limit_per_minute`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::SecurityConfig;
use crate::observability::metrics;

/// Buckets beyond this count trigger a sweep of idle ones.
const SWEEP_THRESHOLD: usize = 10_000;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        self.refill(Instant::now(), capacity, refill_rate);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter state, one bucket per client key.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    /// Tokens per second.
    refill_rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// Returns `None` when rate limiting is disabled.
    pub fn from_config(config: &SecurityConfig) -> Option<Self> {
        (config.rate_limit_per_minute > 0)
            .then(|| Self::new(config.rate_limit_per_minute, config.rate_limit_burst))
    }

    pub fn new(per_minute: u32, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            refill_rate: per_minute as f64 / 60.0,
            capacity: burst.max(1) as f64,
        }
    }

    /// Take one token for `key`. `false` means the caller is over the limit.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        if buckets.len() >= SWEEP_THRESHOLD {
            let now = Instant::now();
            let (capacity, rate) = (self.capacity, self.refill_rate);
            // A full bucket carries no state worth keeping.
            buckets.retain(|_, bucket| {
                bucket.refill(now, capacity, rate);
                bucket.tokens < capacity
            });
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity))
            .try_acquire(self.capacity, self.refill_rate)
    }

    /// Number of tracked clients.
    pub fn tracked(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }
}

/// Middleware function for per-IP rate limiting.
///
/// Requests served without connect info (in-process tests) share one bucket.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "message": "Too many requests." })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new(60, 3);

        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(60, 1);

        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_refill() {
        let mut bucket = TokenBucket::new(2.0);
        bucket.tokens = 0.0;
        let later = bucket.last_update + std::time::Duration::from_secs(1);
        bucket.refill(later, 2.0, 1.5);
        assert!((bucket.tokens - 1.5).abs() < 1e-9);

        let much_later = later + std::time::Duration::from_secs(60);
        bucket.refill(much_later, 2.0, 1.5);
        assert_eq!(bucket.tokens, 2.0);
    }

    #[test]
    fn test_disabled_by_zero_rate() {
        let config = SecurityConfig {
            rate_limit_per_minute: 0,
            ..Default::default()
        };
        assert!(RateLimiter::from_config(&config).is_none());
        assert!(RateLimiter::from_config(&SecurityConfig::default()).is_some());
    }
}
