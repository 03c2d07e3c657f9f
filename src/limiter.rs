//! Per-client admission control: one continuously refilled token bucket
//! per client address, with idle-entry eviction so memory stays bounded
//! no matter how many distinct clients have ever connected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub enabled: bool,
    pub requests_per_second: f64,
    pub burst: u32,
    pub sweep_interval: Duration,
    pub idle_after: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
            sweep_interval: Duration::from_secs(60),
            idle_after: Duration::from_secs(180),
        }
    }
}

struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl ClientBucket {
    fn new(burst: u32) -> Self {
        let now = Instant::now();
        Self {
            tokens: burst as f64,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Continuous replenishment, not batch reset per interval.
    fn try_take(&mut self, rps: f64, burst: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rps).min(burst as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiter {
    cfg: LimiterConfig,
    clients: Mutex<HashMap<String, ClientBucket>>,
}

impl RateLimiter {
    pub fn new(cfg: LimiterConfig) -> Self {
        Self {
            cfg,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Withdraw one token from the client's bucket, creating it on first
    /// sight. The whole read-check-write runs under the registry lock so
    /// two concurrent requests cannot both be admitted on a single
    /// remaining token. The lock is never held across I/O.
    pub fn allow(&self, client: &str) -> bool {
        if !self.cfg.enabled {
            return true;
        }

        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let bucket = clients
            .entry(client.to_string())
            .or_insert_with(|| ClientBucket::new(self.cfg.burst));
        bucket.last_seen = Instant::now();
        bucket.try_take(self.cfg.requests_per_second, self.cfg.burst)
    }

    /// Drop buckets unseen for longer than the idle window. Takes the same
    /// registry lock as `allow`, so eviction cannot interleave with an
    /// in-flight admission decision. Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let idle_after = self.cfg.idle_after;
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let before = clients.len();
        let now = Instant::now();
        clients.retain(|_, bucket| now.duration_since(bucket.last_seen) <= idle_after);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Spawn the periodic idle sweep. Call this once at startup; a disabled
/// limiter keeps no state, so there is nothing to sweep.
pub fn spawn_sweep(limiter: Arc<RateLimiter>) {
    if !limiter.cfg.enabled {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.cfg.sweep_interval);
        loop {
            interval.tick().await;
            let removed = limiter.sweep_idle();
            if removed > 0 {
                tracing::debug!(removed, "evicted idle client buckets");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn limiter(enabled: bool, rps: f64, burst: u32, idle_after: Duration) -> RateLimiter {
        RateLimiter::new(LimiterConfig {
            enabled,
            requests_per_second: rps,
            burst,
            sweep_interval: Duration::from_secs(60),
            idle_after,
        })
    }

    #[test]
    fn burst_is_admitted_then_quota_hits() {
        let limiter = limiter(true, 2.0, 4, Duration::from_secs(180));
        for _ in 0..4 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn bucket_refills_continuously() {
        let limiter = limiter(true, 2.0, 4, Duration::from_secs(180));
        for _ in 0..4 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));

        // At 2 tokens/second, ~600ms buys back a bit over one token:
        // exactly one further request is admitted.
        thread::sleep(Duration::from_millis(600));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn clients_do_not_share_buckets() {
        let limiter = limiter(true, 2.0, 4, Duration::from_secs(180));
        for _ in 0..5 {
            limiter.allow("10.0.0.1");
        }
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn disabled_limiter_admits_everything_and_keeps_no_state() {
        let limiter = limiter(false, 2.0, 1, Duration::from_secs(180));
        for _ in 0..100 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn idle_buckets_are_swept_and_recreated_fresh() {
        let limiter = limiter(true, 2.0, 4, Duration::from_millis(100));
        for _ in 0..5 {
            limiter.allow("10.0.0.1");
        }
        assert!(!limiter.allow("10.0.0.1"));
        assert_eq!(limiter.tracked_clients(), 1);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(limiter.sweep_idle(), 1);
        assert_eq!(limiter.tracked_clients(), 0);

        // A fresh bucket starts with a full burst again.
        for _ in 0..4 {
            assert!(limiter.allow("10.0.0.1"));
        }
    }

    #[test]
    fn recently_seen_buckets_survive_the_sweep() {
        let limiter = limiter(true, 2.0, 4, Duration::from_secs(180));
        limiter.allow("10.0.0.1");
        assert_eq!(limiter.sweep_idle(), 0);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
