//! Schema migration commands: up, down, status

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use leasehold_server::db::{migrate_down, migrate_up, migration_status};
use leasehold_server::ServerConfig;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: MigrateCommand,
}

#[derive(Subcommand, Debug)]
pub enum MigrateCommand {
    /// Apply all pending migrations
    Up,
    /// Revert migrations down to a version (default: revert the latest one)
    Down {
        /// Version to leave applied; 0 reverts everything
        #[arg(long)]
        target: Option<i64>,
    },
    /// List known migrations and whether each is applied
    Status,
}

pub async fn run_migrate(args: MigrateArgs, mut config: ServerConfig) -> Result<()> {
    if let Some(url) = args.database_url {
        config.database_url = Some(url);
    }
    let pool = super::connect(&config).await?;

    match args.command {
        MigrateCommand::Up => {
            migrate_up(&pool).await.context("Failed to apply migrations")?;
            println!("Migrations applied");
        }
        MigrateCommand::Down { target } => {
            let reverted = migrate_down(&pool, target)
                .await
                .context("Failed to revert migrations")?;
            if reverted.is_empty() {
                println!("Nothing to revert");
            }
            for version in reverted {
                println!("Reverted {version}");
            }
        }
        MigrateCommand::Status => {
            let states = migration_status(&pool)
                .await
                .context("Failed to read migration status")?;
            for state in states {
                let mark = if state.applied { "applied" } else { "pending" };
                println!("{:>4}  {:<8} {}", state.version, mark, state.description);
            }
        }
    }

    pool.close().await;
    Ok(())
}
