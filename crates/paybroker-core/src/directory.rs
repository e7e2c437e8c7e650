//! Tenant directory: credential and callback resolution.
//!
//! Credentials resolve cache-aside: the cache is consulted first, the store
//! on a miss, and a positive store answer is written back with a fixed TTL.
//! Negative answers are never cached, so a tenant registered a moment ago is
//! visible immediately, at the price of a store read for every unknown
//! credential. Cache entries are not invalidated when a tenant changes; the
//! staleness window equals the TTL.
//!
//! Concurrent misses for the same credential are not coalesced and may each
//! reach the store.
//!
//! Callback targets are read straight from the store on every webhook.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

use crate::{
    cache::CredentialCache,
    error::{CoreError, Result},
    models::{CallbackTarget, Tenant, TenantId, TenantIdentity},
    storage::Storage,
};

/// Default credential cache TTL (one week).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Read access to tenant records.
#[async_trait]
pub trait TenantStore: Send + Sync + 'static {
    /// Finds the tenant owning a credential.
    async fn find_by_credential(&self, credential: &str) -> Result<Option<Tenant>>;

    /// Finds a tenant by id.
    async fn find_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Production store backed by the PostgreSQL repositories.
pub struct PostgresTenantStore {
    storage: Arc<Storage>,
}

impl PostgresTenantStore {
    /// Creates a new PostgreSQL store adapter.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TenantStore for PostgresTenantStore {
    async fn find_by_credential(&self, credential: &str) -> Result<Option<Tenant>> {
        self.storage.tenants.find_by_credential(credential).await
    }

    async fn find_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        self.storage.tenants.find_by_id(tenant_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.storage.health_check().await
    }
}

/// Resolves credentials and tenant ids against the cache and the store.
#[derive(Clone)]
pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
    cache: Arc<dyn CredentialCache>,
    cache_ttl: Duration,
}

impl TenantDirectory {
    /// Creates a directory over the given collaborators.
    pub fn new(
        store: Arc<dyn TenantStore>,
        cache: Arc<dyn CredentialCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self { store, cache, cache_ttl }
    }

    /// TTL applied to cache entries written by this directory.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Resolves a tenant credential to its identity.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` if no tenant owns the credential or the tenant
    ///   has no provider account.
    /// - `CoreError::Cache` / `CoreError::Database` if a collaborator is
    ///   unreachable.
    #[instrument(name = "resolve_by_credential", skip_all)]
    pub async fn resolve_by_credential(&self, credential: &str) -> Result<TenantIdentity> {
        match self.cache.get(credential).await {
            Ok(Some(value)) => {
                if let Some(identity) = TenantIdentity::from_cache_value(&value) {
                    debug!(tenant_id = %identity.tenant_id, "Credential resolved from cache");
                    return Ok(identity);
                }
                warn!("Ignoring malformed credential cache entry");
            },
            Ok(None) => debug!("Credential cache miss"),
            Err(e) => {
                error!(error = %e, "Credential cache lookup failed");
                return Err(e);
            },
        }

        let tenant = self
            .store
            .find_by_credential(credential)
            .await
            .inspect_err(|e| error!(error = %e, "Tenant store lookup by credential failed"))?
            .ok_or_else(|| CoreError::NotFound("credential is not registered".into()))?;

        let identity = tenant.identity();
        if !identity.is_complete() {
            warn!(tenant_id = %identity.tenant_id, "Tenant has no provider account");
            return Err(CoreError::NotFound("tenant has no provider account".into()));
        }

        if let Err(e) =
            self.cache.set(credential, &identity.to_cache_value(), self.cache_ttl).await
        {
            warn!(tenant_id = %identity.tenant_id, error = %e, "Failed to cache credential");
        }

        debug!(tenant_id = %identity.tenant_id, "Credential resolved from store");
        Ok(identity)
    }

    /// Looks up where a tenant's callbacks are delivered. Never cached.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown tenant and
    /// `CoreError::Database` if the store is unreachable.
    #[instrument(name = "resolve_callback_target", skip(self), fields(tenant_id = %tenant_id))]
    pub async fn resolve_callback_target(&self, tenant_id: TenantId) -> Result<CallbackTarget> {
        let tenant = self
            .store
            .find_by_id(tenant_id)
            .await
            .inspect_err(|e| error!(error = %e, "Tenant store lookup by id failed"))?
            .ok_or_else(|| CoreError::NotFound(format!("tenant {tenant_id} is not registered")))?;

        Ok(tenant.callback_target())
    }

    /// Checks the persistent store.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it is unreachable.
    pub async fn check_store(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Checks the credential cache.
    ///
    /// # Errors
    ///
    /// Returns the cache's error if it is unreachable.
    pub async fn check_cache(&self) -> Result<()> {
        self.cache.ping().await
    }
}

pub mod mock {
    //! In-memory tenant store for tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::RwLock;

    use super::TenantStore;
    use crate::{
        error::{CoreError, Result},
        models::{Tenant, TenantId},
    };

    /// Builds a tenant record for tests.
    pub fn tenant(id: i64, provider_account_id: &str, callback_url: &str, credential: &str) -> Tenant {
        Tenant {
            id: TenantId(id),
            name: format!("tenant-{id}"),
            provider_account_id: provider_account_id.to_string(),
            callback_url: callback_url.to_string(),
            credential: credential.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Tenant store that counts reads.
    #[derive(Debug, Default)]
    pub struct InMemoryTenantStore {
        tenants: RwLock<Vec<Tenant>>,
        credential_reads: AtomicUsize,
        id_reads: AtomicUsize,
        failing: AtomicBool,
    }

    impl InMemoryTenantStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a store holding the given tenants.
        pub fn with_tenants(tenants: Vec<Tenant>) -> Self {
            Self { tenants: RwLock::new(tenants), ..Self::default() }
        }

        /// Adds a tenant.
        pub async fn insert(&self, tenant: Tenant) {
            self.tenants.write().await.push(tenant);
        }

        /// Number of lookups by credential so far.
        pub fn credential_reads(&self) -> usize {
            self.credential_reads.load(Ordering::SeqCst)
        }

        /// Number of lookups by id so far.
        pub fn id_reads(&self) -> usize {
            self.id_reads.load(Ordering::SeqCst)
        }

        /// Makes every subsequent operation fail with `CoreError::Database`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check_available(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::Database("store unavailable".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TenantStore for InMemoryTenantStore {
        async fn find_by_credential(&self, credential: &str) -> Result<Option<Tenant>> {
            self.credential_reads.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;

            let tenants = self.tenants.read().await;
            Ok(tenants.iter().find(|t| t.credential == credential).cloned())
        }

        async fn find_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
            self.id_reads.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;

            let tenants = self.tenants.read().await;
            Ok(tenants.iter().find(|t| t.id == tenant_id).cloned())
        }

        async fn ping(&self) -> Result<()> {
            self.check_available()
        }
    }
}
