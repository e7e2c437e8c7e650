//! Paybroker payment provider gateway.
//!
//! Main entry point. `serve` (the default) runs the HTTP server; `tenant`
//! subcommands administer the tenant table directly.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paybroker_api::{AppState, Config, RedisRateLimiter};
use paybroker_core::{
    NewTenant, PostgresTenantStore, RedisCredentialCache, Storage, Tenant, TenantId,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "paybroker", version, about = "Multi-tenant payment provider gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve,
    /// Manage registered tenants.
    #[command(subcommand)]
    Tenant(TenantCommand),
}

#[derive(Debug, Subcommand)]
enum TenantCommand {
    /// Register a tenant and print its generated credential.
    Add {
        /// Human-readable tenant name.
        #[arg(long)]
        name: String,
        /// Provider sub-account calls are routed to.
        #[arg(long)]
        account_id: String,
        /// Absolute URL provider callbacks are forwarded to.
        #[arg(long)]
        callback_url: String,
    },
    /// List all tenants.
    List,
    /// Delete a tenant.
    Delete {
        /// Tenant identifier.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        redis_url = %config.redis_url_masked(),
        provider = %config.provider_base_url,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    let storage = Storage::new(db_pool.clone());
    storage.migrate().await.context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, storage).await,
        Command::Tenant(command) => run_tenant_command(&storage, command).await,
    };

    db_pool.close().await;
    info!("Database connections closed");

    result
}

async fn serve(config: &Config, storage: Storage) -> Result<()> {
    info!("Starting paybroker");

    let cache = RedisCredentialCache::connect(&config.redis_url)
        .await
        .context("Failed to connect credential cache")?;
    let rate_limiter = RedisRateLimiter::connect(&config.redis_url)
        .await
        .context("Failed to connect rate limiter")?;
    info!("Redis connections established");

    let store = Arc::new(PostgresTenantStore::new(Arc::new(storage)));
    let state = AppState::from_config(config, store, Arc::new(cache), Arc::new(rate_limiter))?;

    let addr = config.parse_server_addr()?;
    info!(addr = %addr, "paybroker is ready to route payments");

    if let Err(e) = paybroker_api::start_server(state, addr).await {
        error!(error = %e, "Server failed");
        return Err(e).context("HTTP server terminated");
    }

    info!("paybroker shutdown complete");
    Ok(())
}

async fn run_tenant_command(storage: &Storage, command: TenantCommand) -> Result<()> {
    match command {
        TenantCommand::Add { name, account_id, callback_url } => {
            let new_tenant = NewTenant::new(name, account_id, callback_url);
            new_tenant.validate()?;

            let tenant = storage.tenants.create(&new_tenant).await?;
            info!(tenant_id = %tenant.id, "Tenant registered");
            print_tenant(&tenant);
        },
        TenantCommand::List => {
            let tenants = storage.tenants.find_all().await?;
            if tenants.is_empty() {
                println!("no tenants registered");
            }
            for tenant in &tenants {
                print_tenant(tenant);
            }
        },
        TenantCommand::Delete { id } => {
            storage.tenants.delete(TenantId(id)).await?;
            info!(tenant_id = id, "Tenant deleted");
            println!("deleted tenant {id}");
        },
    }

    Ok(())
}

fn print_tenant(tenant: &Tenant) {
    println!(
        "{}\t{}\taccount={}\tcallback={}\tapi_key={}",
        tenant.id, tenant.name, tenant.provider_account_id, tenant.callback_url, tenant.credential
    );
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,paybroker=debug,tower_http=debug"))
        .context("Invalid RUST_LOG environment variable")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_default() {
        let cli = Cli::try_parse_from(["paybroker"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_tenant_add() {
        let cli = Cli::try_parse_from([
            "paybroker",
            "tenant",
            "add",
            "--name",
            "Acme",
            "--account-id",
            "acct_1",
            "--callback-url",
            "https://acme.example.com/hooks",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Tenant(TenantCommand::Add { name, account_id, callback_url })) => {
                assert_eq!(name, "Acme");
                assert_eq!(account_id, "acct_1");
                assert_eq!(callback_url, "https://acme.example.com/hooks");
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_tenant_delete() {
        let cli = Cli::try_parse_from(["paybroker", "tenant", "delete", "42"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Tenant(TenantCommand::Delete { id: 42 }))));
    }
}
