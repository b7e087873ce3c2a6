//! Fixed-window request counters behind the gateway's per-client cap.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;

/// Length of one counting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Failure of the counter backend itself.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// The backend could not be reached or rejected the command. The
    /// gateway lets the request through when this happens.
    #[error("rate limiter backend unavailable: {0}")]
    Unavailable(String),
}

/// Fixed-window request counter keyed by client.
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key`, returning the number of hits in the
    /// current window including this one.
    fn hit(&self, key: String) -> BoxFuture<'static, Result<u64, LimiterError>>;
}

/// Key under which requests of one client address are counted.
pub fn client_key(ip: &str) -> String {
    format!("rate_limit:{ip}")
}

/// Process-local counters; each key restarts its window on the first hit
/// after expiry. Expired keys are swept at most once per window so the map
/// only holds clients seen during the last minute or so.
#[derive(Clone)]
pub struct MemoryLimiter {
    windows: Arc<DashMap<String, (Instant, u64)>>,
    origin: Instant,
    /// Milliseconds after `origin` of the last sweep.
    last_sweep: Arc<AtomicU64>,
}

impl Default for MemoryLimiter {
    fn default() -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            origin: Instant::now(),
            last_sweep: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl MemoryLimiter {
    /// Empty limiter whose sweep clock starts now.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Drop every key whose window has ended, unless a sweep already ran
    /// within the last window. Only one caller wins the sweep.
    fn sweep(&self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.origin).as_millis() as u64;
        let last = self.last_sweep.load(Ordering::Relaxed);
        if elapsed.saturating_sub(last) < WINDOW.as_millis() as u64 {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, elapsed, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.windows
            .retain(|_, (started, _)| now.saturating_duration_since(*started) < WINDOW);
    }

    fn count(&self, key: String, now: Instant) -> u64 {
        // No entry guard may be alive while sweeping: `retain` locks every shard.
        self.sweep(now);
        let mut entry = self.windows.entry(key).or_insert((now, 0));
        let (started, hits) = entry.value_mut();
        if now.saturating_duration_since(*started) >= WINDOW {
            *started = now;
            *hits = 0;
        }
        *hits += 1;
        *hits
    }
}

impl RateLimiter for MemoryLimiter {
    fn hit(&self, key: String) -> BoxFuture<'static, Result<u64, LimiterError>> {
        let hits = self.count(key, Instant::now());
        Box::pin(async move { Ok(hits) })
    }
}

#[cfg(feature = "redis-limiter")]
pub use self::redis_backend::RedisLimiter;

#[cfg(feature = "redis-limiter")]
mod redis_backend {
    use futures::future::BoxFuture;
    use redis::{Client, Pipeline, aio::ConnectionManager};

    use super::{LimiterError, RateLimiter, WINDOW};

    fn unavailable(err: redis::RedisError) -> LimiterError {
        LimiterError::Unavailable(err.to_string())
    }

    /// `MULTI; SET key 0 EX 60 NX; INCR key; EXEC`. The expiry is attached
    /// when the key is created, so a counter can never outlive its window.
    pub(super) fn window_pipeline(key: &str) -> Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(WINDOW.as_secs())
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key);
        pipe
    }

    /// Counters shared by every gateway replica through Redis.
    #[derive(Clone)]
    pub struct RedisLimiter {
        connection: ConnectionManager,
    }

    impl RedisLimiter {
        /// Open a managed connection to `url`, failing if Redis is unreachable.
        pub async fn connect(url: &str) -> Result<Self, LimiterError> {
            let client = Client::open(url).map_err(unavailable)?;
            let connection = client
                .get_connection_manager()
                .await
                .map_err(unavailable)?;
            Ok(Self { connection })
        }
    }

    impl RateLimiter for RedisLimiter {
        fn hit(&self, key: String) -> BoxFuture<'static, Result<u64, LimiterError>> {
            let mut connection = self.connection.clone();
            Box::pin(async move {
                let (hits,): (u64,) = window_pipeline(&key)
                    .query_async(&mut connection)
                    .await
                    .map_err(unavailable)?;
                Ok(hits)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_per_key() {
        let limiter = MemoryLimiter::new();
        assert_eq!(limiter.hit(client_key("1.1.1.1")).await.unwrap(), 1);
        assert_eq!(limiter.hit(client_key("1.1.1.1")).await.unwrap(), 2);
        assert_eq!(limiter.hit(client_key("2.2.2.2")).await.unwrap(), 1);
    }

    #[test]
    fn window_restarts_after_a_minute() {
        let limiter = MemoryLimiter::new();
        let start = Instant::now();
        assert_eq!(limiter.count("k".into(), start), 1);
        assert_eq!(limiter.count("k".into(), start + Duration::from_secs(59)), 2);
        assert_eq!(limiter.count("k".into(), start + WINDOW), 1);
    }

    #[test]
    fn expired_clients_are_evicted() {
        let limiter = MemoryLimiter::new();
        let start = limiter.origin;
        for n in 0..100 {
            limiter.count(format!("client-{n}"), start);
        }
        assert_eq!(limiter.tracked(), 100);

        limiter.count("late".into(), start + WINDOW + Duration::from_secs(1));
        assert_eq!(limiter.tracked(), 1);

        // Sweeps are rate limited to one per window.
        limiter.count("other".into(), start + WINDOW + Duration::from_secs(2));
        assert_eq!(limiter.tracked(), 2);
    }

    #[cfg(feature = "redis-limiter")]
    #[test]
    fn redis_counter_sets_expiry_in_the_same_transaction() {
        let packed = String::from_utf8_lossy(
            &redis_backend::window_pipeline("rate_limit:1.2.3.4").get_packed_pipeline(),
        )
        .into_owned();
        let order: Vec<usize> = ["MULTI", "SET", "NX", "INCR", "EXEC"]
            .iter()
            .map(|word| packed.find(word).unwrap())
            .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{packed}");
        assert!(packed.contains("EX\r\n$2\r\n60"));
    }
}
