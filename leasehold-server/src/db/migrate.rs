//! Apply, revert and inspect the embedded migrations

use sqlx::migrate::{Migrate, MigrateError};
use sqlx::PgPool;

use super::MIGRATOR;

/// One known migration and whether the database has it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

/// Apply every pending migration.
pub async fn migrate_up(pool: &PgPool) -> Result<(), MigrateError> {
    tracing::info!("applying pending migrations");
    MIGRATOR.run(pool).await
}

/// Revert applied migrations newer than `target`.
///
/// Without a target only the most recent migration is reverted. Returns the
/// reverted versions, newest first.
pub async fn migrate_down(pool: &PgPool, target: Option<i64>) -> Result<Vec<i64>, MigrateError> {
    let mut applied = applied_versions(pool).await?;
    applied.sort_unstable();

    let target = match target {
        Some(target) => target,
        None => match applied.as_slice() {
            [] => return Ok(Vec::new()),
            [.., previous, _] => *previous,
            [_] => 0,
        },
    };

    let reverted: Vec<i64> = applied.into_iter().rev().filter(|v| *v > target).collect();
    if reverted.is_empty() {
        tracing::info!(target, "nothing to revert");
        return Ok(reverted);
    }

    tracing::info!(target, count = reverted.len(), "reverting migrations");
    MIGRATOR.undo(pool, target).await?;
    Ok(reverted)
}

/// Every embedded migration, oldest first, with its applied flag.
pub async fn migration_status(pool: &PgPool) -> Result<Vec<MigrationState>, MigrateError> {
    let applied = applied_versions(pool).await?;

    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| MigrationState {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.contains(&m.version),
        })
        .collect())
}

async fn applied_versions(pool: &PgPool) -> Result<Vec<i64>, MigrateError> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    let applied = conn.list_applied_migrations().await?;
    Ok(applied.into_iter().map(|m| m.version).collect())
}
