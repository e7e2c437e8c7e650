//! Credential cache abstraction for the tenant directory.
//!
//! The directory caches `credential -> "{tenant_id}:{provider_account_id}"`
//! with a fixed TTL. Production uses Redis; tests use the in-memory
//! implementation in [`mock`], whose expiry follows an injectable clock.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Default key prefix for cached credentials.
pub const DEFAULT_KEY_PREFIX: &str = "paybroker:credential";

/// Key-value cache with per-entry expiry.
///
/// Implementations must be safe to share across all in-flight requests.
#[async_trait]
pub trait CredentialCache: Send + Sync + 'static {
    /// Returns the cached value, or `None` on a miss or after expiry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Checks that the cache is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Redis-backed credential cache.
///
/// Credentials are hashed before they become Redis keys so the cache never
/// holds them in clear.
#[derive(Clone)]
pub struct RedisCredentialCache {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisCredentialCache {
    /// Connects to Redis at `url`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Cache` if the URL is invalid or the connection
    /// cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self::new(connection))
    }

    /// Wraps an existing connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection, prefix: DEFAULT_KEY_PREFIX.to_string() }
    }

    /// Overrides the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn build_key(&self, key: &str) -> String {
        hashed_key(&self.prefix, key)
    }
}

/// Builds `"{prefix}:{sha256(key)}"`.
pub fn hashed_key(prefix: &str, key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{prefix}:{}", hex::encode(digest))
}

#[async_trait]
impl CredentialCache for RedisCredentialCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&key).await?;
        debug!(hit = value.is_some(), "Credential cache lookup");

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_seconds = ttl.as_secs();
        if ttl_seconds == 0 {
            return Err(CoreError::InvalidInput("cache ttl must be at least one second".into()));
        }

        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        let _: () = conn.set_ex(&key, value, ttl_seconds).await?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(())
    }
}

pub mod mock {
    //! In-memory credential cache for tests.
    //!
    //! Counts operations so tests can assert cache-aside behaviour and can be
    //! switched into a failing mode to simulate an unreachable cache.

    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    use async_trait::async_trait;
    use tokio::sync::RwLock;

    use super::CredentialCache;
    use crate::{
        error::{CoreError, Result},
        time::{Clock, RealClock},
    };

    /// In-memory cache with clock-driven expiry.
    #[derive(Debug)]
    pub struct InMemoryCredentialCache {
        entries: RwLock<HashMap<String, (String, Instant)>>,
        clock: Arc<dyn Clock>,
        gets: AtomicUsize,
        sets: AtomicUsize,
        failing: AtomicBool,
        failing_writes: AtomicBool,
    }

    impl InMemoryCredentialCache {
        /// Creates an empty cache using the system clock.
        pub fn new() -> Self {
            Self::with_clock(Arc::new(RealClock))
        }

        /// Creates an empty cache that expires entries by `clock`.
        pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
            Self {
                entries: RwLock::new(HashMap::new()),
                clock,
                gets: AtomicUsize::new(0),
                sets: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                failing_writes: AtomicBool::new(false),
            }
        }

        /// Number of `get` calls so far.
        pub fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        /// Number of `set` calls so far.
        pub fn set_count(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }

        /// Makes every subsequent operation fail with `CoreError::Cache`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Makes only `set` fail; reads keep working.
        pub fn set_failing_writes(&self, failing: bool) {
            self.failing_writes.store(failing, Ordering::SeqCst);
        }

        /// Returns the raw stored value, ignoring expiry and counters.
        pub async fn peek(&self, key: &str) -> Option<String> {
            self.entries.read().await.get(key).map(|(value, _)| value.clone())
        }

        /// Seeds an entry without counting it as a `set`.
        pub async fn seed(&self, key: &str, value: &str, ttl: Duration) {
            let expires_at = self.clock.now() + ttl;
            self.entries.write().await.insert(key.to_string(), (value.to_string(), expires_at));
        }

        fn check_available(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::Cache("cache unavailable".into()));
            }
            Ok(())
        }
    }

    impl Default for InMemoryCredentialCache {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CredentialCache for InMemoryCredentialCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;

            let now = self.clock.now();
            let entries = self.entries.read().await;

            Ok(entries
                .get(key)
                .filter(|(_, expires_at)| *expires_at > now)
                .map(|(value, _)| value.clone()))
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            if self.failing_writes.load(Ordering::SeqCst) {
                return Err(CoreError::Cache("cache rejected write".into()));
            }

            let expires_at = self.clock.now() + ttl;
            self.entries.write().await.insert(key.to_string(), (value.to_string(), expires_at));

            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            self.check_available()
        }
    }
}
