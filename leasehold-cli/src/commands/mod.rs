//! Command implementations for the leasehold CLI

pub mod migrate;
pub mod serve;

pub use migrate::run_migrate;
pub use serve::run_serve;

use anyhow::{Context, Result};
use leasehold_server::db::{create_pool_with_options, PgPool};
use leasehold_server::ServerConfig;

/// Open a pool for the configured database, failing early when no URL is set.
async fn connect(config: &ServerConfig) -> Result<PgPool> {
    let url = config.database_url.as_deref().context(
        "DATABASE_URL not set. Set via --database-url, DATABASE_URL env, .env, or the config file",
    )?;

    create_pool_with_options(url, config.max_connections)
        .await
        .context("Failed to create database pool")
}
