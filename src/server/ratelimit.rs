//! Per-client-IP token bucket rate limiting with idle eviction.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::debug;

/// How often the eviction worker sweeps the bucket map.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// How long a bucket may sit idle before it is dropped.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            refilled_at: now,
            last_seen: now,
        }
    }

    fn allow(&mut self, rate: f64, burst: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.refilled_at);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(burst);
        self.refilled_at = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client IP. The hot path holds the map read lock
/// and a per-bucket mutex; the write lock is taken only to insert a new
/// bucket or to evict idle ones.
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Mutex<Bucket>>>,
    rate: f64,
    burst: f64,
    max_age: Duration,
}

impl RateLimiter {
    /// `rate` sustained requests per second with bursts up to `burst`.
    pub fn new(rate: u32, burst: u32) -> Self {
        Self::with_max_age(rate, burst, DEFAULT_MAX_AGE)
    }

    pub fn with_max_age(rate: u32, burst: u32, max_age: Duration) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            rate: f64::from(rate.max(1)),
            burst: f64::from(burst.max(1)),
            max_age,
        }
    }

    /// Whether a request from `ip` may proceed right now.
    pub fn allow(&self, ip: &str) -> bool {
        self.allow_at(ip, Instant::now())
    }

    fn allow_at(&self, ip: &str, now: Instant) -> bool {
        {
            let buckets = self.buckets.read();
            if let Some(bucket) = buckets.get(ip) {
                return bucket.lock().allow(self.rate, self.burst, now);
            }
        }

        let mut buckets = self.buckets.write();
        buckets
            .entry(ip.to_string())
            .or_insert_with(|| Mutex::new(Bucket::new(self.burst, now)))
            .get_mut()
            .allow(self.rate, self.burst, now)
    }

    /// Drop buckets idle for longer than `max_age`.
    pub fn evict_idle(&self) {
        let mut buckets = self.buckets.write();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.get_mut().last_seen.elapsed() <= self.max_age);
        let evicted = before - buckets.len();
        if evicted > 0 {
            debug!(evicted, remaining = buckets.len(), "evicted idle rate-limit buckets");
        }
    }

    pub fn tracked_ips(&self) -> usize {
        self.buckets.read().len()
    }

    /// Background sweep on a fixed interval until shutdown.
    pub async fn run_eviction(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick resolves immediately
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = ticker.tick() => self.evict_idle(),
            }
        }
    }
}
