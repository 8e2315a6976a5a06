//! HTTP server command
//!
//! Runs pending migrations, then serves `/api/v1` until Ctrl+C or SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use leasehold_server::db::migrate_up;
use leasehold_server::{run_server, ServerConfig, Services};
use tokio_util::sync::CancellationToken;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config and LEASEHOLD_BIND)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Serve from an in-memory store; nothing survives a restart
    #[arg(long)]
    pub in_memory: bool,

    /// Do not apply pending migrations before binding
    #[arg(long)]
    pub skip_migrations: bool,
}

impl ServeArgs {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if self.cors_permissive {
            config.cors_permissive = true;
        }
        if let Some(url) = &self.database_url {
            config.database_url = Some(url.clone());
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, mut config: ServerConfig) -> Result<()> {
    args.apply(&mut config);

    let services = if args.in_memory {
        tracing::warn!("Serving from an in-memory store, data is lost on exit");
        Services::in_memory()
    } else {
        let pool = super::connect(&config).await?;
        if args.skip_migrations {
            tracing::info!("Skipping migrations");
        } else {
            migrate_up(&pool).await.context("Failed to run migrations")?;
        }
        Services::postgres(pool)
    };

    tracing::info!("Starting leasehold server on {}", config.bind_addr);

    // Blocks until shutdown
    run_server(services, &config, CancellationToken::new())
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = ServeArgs::parse_from([
            "serve",
            "--bind",
            "0.0.0.0:9999",
            "--cors-permissive",
            "--database-url",
            "postgres://db/leasehold",
        ]);
        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.bind_addr, "0.0.0.0:9999".parse().unwrap());
        assert!(config.cors_permissive);
        assert_eq!(config.database_url.as_deref(), Some("postgres://db/leasehold"));
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = ServerConfig {
            database_url: Some("postgres://from/config".into()),
            ..ServerConfig::default()
        };
        let args = ServeArgs {
            bind: None,
            cors_permissive: false,
            database_url: None,
            in_memory: true,
            skip_migrations: false,
        };
        args.apply(&mut config);

        assert_eq!(config.database_url.as_deref(), Some("postgres://from/config"));
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }
}
