//! Per-client admission control.
//!
//! Fixed one-second windows: each client key gets a counter per wall-clock
//! second and a request is admitted while the counter is within the limit.

use std::sync::Arc;

use async_trait::async_trait;
use paybroker_core::{
    error::Result,
    time::{unix_seconds, Clock, RealClock},
};
use redis::{aio::ConnectionManager, Client};
use tracing::trace;

/// Default key prefix for rate limit counters.
pub const DEFAULT_KEY_PREFIX: &str = "paybroker:ratelimit";

/// Counts requests per client.
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Records a request for `key` and returns whether it is within `limit`
    /// requests for the current second.
    async fn allow(&self, key: &str, limit: u64) -> Result<bool>;
}

/// Redis-backed limiter shared by every broker instance.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl RedisRateLimiter {
    /// Connects to Redis at `url`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Cache` if the connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self::new(conn))
    }

    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: DEFAULT_KEY_PREFIX.to_string(), clock: Arc::new(RealClock) }
    }

    fn window_key(&self, key: &str, window: u64) -> String {
        format!("{}:{key}:{window}", self.prefix)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &str, limit: u64) -> Result<bool> {
        let window = unix_seconds(self.clock.as_ref());
        let full_key = self.window_key(key, window);

        let script = redis::Script::new(
            r"
            local count = redis.call('INCR', KEYS[1])
            if count == 1 then
                redis.call('EXPIRE', KEYS[1], 2)
            end
            return count
            ",
        );

        let mut conn = self.conn.clone();
        let count: u64 = script.key(&full_key).invoke_async(&mut conn).await?;

        trace!(key = %key, count, limit, "Rate limit window updated");
        Ok(count <= limit)
    }
}

pub mod mock {
    //! In-memory limiter for tests.

    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    };

    use async_trait::async_trait;
    use paybroker_core::{
        error::{CoreError, Result},
        time::{unix_seconds, Clock, RealClock},
    };
    use tokio::sync::Mutex;

    use super::RateLimiter;

    /// Fixed-window limiter with clock-driven windows.
    #[derive(Debug)]
    pub struct InMemoryRateLimiter {
        windows: Mutex<HashMap<String, (u64, u64)>>,
        clock: Arc<dyn Clock>,
        failing: AtomicBool,
    }

    impl InMemoryRateLimiter {
        /// Creates a limiter using the system clock.
        pub fn new() -> Self {
            Self::with_clock(Arc::new(RealClock))
        }

        /// Creates a limiter whose windows follow `clock`.
        pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
            Self { windows: Mutex::new(HashMap::new()), clock, failing: AtomicBool::new(false) }
        }

        /// Makes every subsequent check fail with `CoreError::Cache`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl Default for InMemoryRateLimiter {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RateLimiter for InMemoryRateLimiter {
        async fn allow(&self, key: &str, limit: u64) -> Result<bool> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::Cache("rate limit store unavailable".into()));
            }

            let window = unix_seconds(self.clock.as_ref());
            let mut windows = self.windows.lock().await;
            let entry = windows.entry(key.to_string()).or_insert((window, 0));

            if entry.0 != window {
                *entry = (window, 0);
            }
            entry.1 += 1;

            Ok(entry.1 <= limit)
        }
    }
}
