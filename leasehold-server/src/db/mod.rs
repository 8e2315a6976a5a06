//! Database setup - connection pool and schema migrations
//!
//! Repositories live in [`crate::store::postgres`]; this module only opens the
//! pool and manages the schema.

pub mod migrate;
pub mod pool;

use sqlx::migrate::Migrator;

/// Reversible migrations embedded from `leasehold-server/migrations`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub use migrate::{migration_status, migrate_down, migrate_up, MigrationState};
pub use pool::{create_pool, create_pool_with_options};
pub use sqlx::PgPool;
