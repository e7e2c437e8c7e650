//! Repository for tenant database operations.
//!
//! Tenants are created and deleted by the administration CLI. The request
//! path only ever reads them, by credential on tenant calls and by id on
//! provider callbacks.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::debug;

use crate::{
    error::{CoreError, Result},
    models::{NewTenant, Tenant, TenantId},
};

/// Repository for tenant database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Validates and inserts a tenant, returning the stored record.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if the record fails validation and
    /// `CoreError::ConstraintViolation` if the credential is already taken.
    pub async fn create(&self, tenant: &NewTenant) -> Result<Tenant> {
        tenant.validate()?;

        let created = sqlx::query_as::<_, Tenant>(
            r"
            INSERT INTO tenants (name, provider_account_id, callback_url, credential)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, provider_account_id, callback_url, credential, created_at
            ",
        )
        .bind(&tenant.name)
        .bind(&tenant.provider_account_id)
        .bind(&tenant.callback_url)
        .bind(&tenant.credential)
        .fetch_one(&*self.pool)
        .await?;

        Ok(created)
    }

    /// Finds a tenant by ID.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r"
            SELECT id, name, provider_account_id, callback_url, credential, created_at
            FROM tenants
            WHERE id = $1
            ",
        )
        .bind(tenant_id)
        .fetch_optional(&*self.pool)
        .await?;

        debug!(tenant_id = %tenant_id, found = tenant.is_some(), "Looked up tenant by id");

        Ok(tenant)
    }

    /// Finds the tenant a credential belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_by_credential(&self, credential: &str) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r"
            SELECT id, name, provider_account_id, callback_url, credential, created_at
            FROM tenants
            WHERE credential = $1
            ",
        )
        .bind(credential)
        .fetch_optional(&*self.pool)
        .await?;

        debug!(found = tenant.is_some(), "Looked up tenant by credential");

        Ok(tenant)
    }

    /// Lists all tenants ordered by id.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_all(&self) -> Result<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(
            r"
            SELECT id, name, provider_account_id, callback_url, credential, created_at
            FROM tenants
            ORDER BY id ASC
            ",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(tenants)
    }

    /// Deletes a tenant.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if no tenant has the given id.
    pub async fn delete(&self, tenant_id: TenantId) -> Result<()> {
        let result = sqlx::query(
            r"
            DELETE FROM tenants
            WHERE id = $1
            ",
        )
        .bind(tenant_id)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("tenant {tenant_id}")));
        }

        Ok(())
    }
}
