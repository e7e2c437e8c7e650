//! Database access layer for tenant records.
//!
//! The repository layer translates between domain models and the database
//! schema. All tenant SQL lives here.

use std::sync::Arc;

use sqlx::PgPool;

pub mod tenants;

use crate::error::Result;

/// Container for repository instances sharing one connection pool.
#[derive(Clone)]
pub struct Storage {
    /// Repository for tenant records.
    pub tenants: Arc<tenants::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self { tenants: Arc::new(tenants::Repository::new(pool)) }
    }

    /// Creates the schema if it does not exist yet. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if a DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.tenants.pool();

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenants (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(64) NOT NULL,
                provider_account_id VARCHAR(64) NOT NULL CHECK (provider_account_id <> ''),
                callback_url VARCHAR(256) NOT NULL,
                credential VARCHAR(64) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&*pool)
        .await?;

        sqlx::query(
            r"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tenants_credential
            ON tenants(credential)
            ",
        )
        .execute(&*pool)
        .await?;

        Ok(())
    }

    /// Verifies the database connection with a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.tenants.pool()).await?;

        Ok(())
    }
}
