//! PostgreSQL store
//!
//! A [`PgHandle`] is either the pool or one shared transaction. Repositories
//! built from a transactional handle run every statement on that transaction's
//! connection; nested units of work become savepoints.
//!
//! All statements run through the request context so cancellation and
//! deadlines abort them. sqlx errors never leave this module: they become
//! entity signals or an opaque [`StorageError`].

mod leases;
mod properties;
mod users;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{Executor, FromRow, PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use super::{
    LeaseRepoError, LeaseRepository, PropertyRepoError, PropertyRepository, StorageError,
    StoreHandle, UnitOfWork, UserRepoError, UserRepository,
};
use crate::context::{Interrupted, RequestContext};

/// Database error, private to the Postgres store
#[derive(Debug, thiserror::Error)]
enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("transaction is no longer open")]
    Closed,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl DbError {
    /// SQLSTATE 23505 on the named constraint.
    fn is_unique_violation(&self, constraint: &str) -> bool {
        match self {
            Self::Sqlx(sqlx::Error::Database(db)) => {
                db.is_unique_violation() && db.constraint() == Some(constraint)
            }
            _ => false,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Interrupted(Interrupted::Cancelled) => Self::Cancelled,
            DbError::Interrupted(Interrupted::DeadlineExceeded) => Self::TimedOut,
            DbError::Closed => Self::TransactionClosed,
            other => Self::query(other),
        }
    }
}

impl From<DbError> for UserRepoError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.into())
    }
}

impl From<DbError> for PropertyRepoError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.into())
    }
}

impl From<DbError> for LeaseRepoError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.into())
    }
}

/// Parse a stored enum column.
fn parse_variant<T: leasehold_core::model::Variant>(
    column: &'static str,
    value: &str,
) -> Result<T, DbError> {
    T::parse(value).ok_or_else(|| DbError::Corrupt(format!("{column} = '{value}'")))
}

/// Pool or transaction handle
#[derive(Clone)]
pub enum PgHandle {
    Pool(PgPool),
    Tx(Arc<PgTx>),
}

/// A transaction shared by every repository of one unit of work
pub struct PgTx {
    conn: Mutex<Option<Transaction<'static, Postgres>>>,
    next_savepoint: AtomicU32,
    /// Savepoints whose units were dropped unfinished; rolled back on next use.
    abandoned: std::sync::Mutex<Vec<String>>,
}

/// Run an argument-free statement on the transaction's connection.
async fn simple(tx: &mut Transaction<'static, Postgres>, sql: String) -> Result<(), DbError> {
    (&mut **tx).execute(sql.as_str()).await?;
    Ok(())
}

type TxGuard<'a> = MutexGuard<'a, Option<Transaction<'static, Postgres>>>;

impl PgTx {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            conn: Mutex::new(Some(tx)),
            next_savepoint: AtomicU32::new(1),
            abandoned: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Lock the connection, first undoing any abandoned savepoints.
    async fn acquire(&self) -> Result<TxGuard<'_>, DbError> {
        let mut guard = self.conn.lock().await;
        let pending: Vec<String> = std::mem::take(
            &mut *self.abandoned.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if let Some(tx) = guard.as_mut() {
            for name in pending {
                tracing::debug!(savepoint = %name, "rolling back abandoned savepoint");
                simple(tx, format!("ROLLBACK TO SAVEPOINT {name}")).await?;
            }
        }
        Ok(guard)
    }

    fn abandon(&self, savepoint: String) {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(savepoint);
    }
}

impl PgHandle {
    pub fn new(pool: PgPool) -> Self {
        Self::Pool(pool)
    }

    async fn fetch_optional<'q, O>(
        &self,
        ctx: &RequestContext,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> Result<Option<O>, DbError>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow> + 'q,
    {
        match self {
            Self::Pool(pool) => Ok(ctx.run(query.fetch_optional(pool)).await??),
            Self::Tx(tx) => {
                let mut guard = ctx.run(tx.acquire()).await??;
                let conn = guard.as_mut().ok_or(DbError::Closed)?;
                Ok(ctx.run(query.fetch_optional(&mut **conn)).await??)
            }
        }
    }

    async fn fetch_all<'q, O>(
        &self,
        ctx: &RequestContext,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> Result<Vec<O>, DbError>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow> + 'q,
    {
        match self {
            Self::Pool(pool) => Ok(ctx.run(query.fetch_all(pool)).await??),
            Self::Tx(tx) => {
                let mut guard = ctx.run(tx.acquire()).await??;
                let conn = guard.as_mut().ok_or(DbError::Closed)?;
                Ok(ctx.run(query.fetch_all(&mut **conn)).await??)
            }
        }
    }

    async fn fetch_one<'q, O>(
        &self,
        ctx: &RequestContext,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> Result<O, DbError>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow> + 'q,
    {
        match self {
            Self::Pool(pool) => Ok(ctx.run(query.fetch_one(pool)).await??),
            Self::Tx(tx) => {
                let mut guard = ctx.run(tx.acquire()).await??;
                let conn = guard.as_mut().ok_or(DbError::Closed)?;
                Ok(ctx.run(query.fetch_one(&mut **conn)).await??)
            }
        }
    }

    /// Run a statement, returning the number of rows affected.
    async fn execute<'q>(
        &self,
        ctx: &RequestContext,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Result<u64, DbError> {
        let result = match self {
            Self::Pool(pool) => ctx.run(query.execute(pool)).await??,
            Self::Tx(tx) => {
                let mut guard = ctx.run(tx.acquire()).await??;
                let conn = guard.as_mut().ok_or(DbError::Closed)?;
                ctx.run(query.execute(&mut **conn)).await??
            }
        };
        Ok(result.rows_affected())
    }

    /// `SELECT EXISTS(...)` on a table's primary key, used to tell a
    /// missing row from a stale one after a guarded update.
    async fn exists(
        &self,
        ctx: &RequestContext,
        table: &'static str,
        id: uuid::Uuid,
    ) -> Result<bool, DbError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
        let (exists,): (bool,) = self
            .fetch_one(ctx, sqlx::query_as(&sql).bind(id))
            .await?;
        Ok(exists)
    }

    async fn begin_unit(&self, ctx: &RequestContext) -> Result<PgUnit, DbError> {
        match self {
            Self::Pool(pool) => {
                let tx = ctx.run(pool.begin()).await??;
                Ok(PgUnit {
                    tx: Arc::new(PgTx::new(tx)),
                    savepoint: None,
                    open: true,
                })
            }
            Self::Tx(tx) => {
                let n = tx.next_savepoint.fetch_add(1, Ordering::Relaxed);
                let name = format!("leasehold_sp_{n}");
                let mut guard = ctx.run(tx.acquire()).await??;
                let conn = guard.as_mut().ok_or(DbError::Closed)?;
                ctx.run(simple(conn, format!("SAVEPOINT {name}")))
                    .await??;
                Ok(PgUnit {
                    tx: Arc::clone(tx),
                    savepoint: Some(name),
                    open: true,
                })
            }
        }
    }
}

#[async_trait]
impl StoreHandle for PgHandle {
    fn users(&self) -> Arc<dyn UserRepository> {
        Arc::new(users::PgUsers::new(self.clone()))
    }

    fn properties(&self) -> Arc<dyn PropertyRepository> {
        Arc::new(properties::PgProperties::new(self.clone()))
    }

    fn leases(&self) -> Arc<dyn LeaseRepository> {
        Arc::new(leases::PgLeases::new(self.clone()))
    }

    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn UnitOfWork>, StorageError> {
        Ok(Box::new(self.begin_unit(ctx).await?))
    }
}

/// Outermost transaction (`savepoint == None`) or a savepoint
struct PgUnit {
    tx: Arc<PgTx>,
    savepoint: Option<String>,
    open: bool,
}

impl PgUnit {
    async fn finish(&mut self, commit: bool) -> Result<(), DbError> {
        self.open = false;
        let mut guard = self.tx.acquire().await?;

        match &self.savepoint {
            None => {
                let tx = guard.take().ok_or(DbError::Closed)?;
                if commit {
                    tx.commit().await?;
                } else {
                    tx.rollback().await?;
                }
            }
            Some(name) => {
                let conn = guard.as_mut().ok_or(DbError::Closed)?;
                if !commit {
                    simple(conn, format!("ROLLBACK TO SAVEPOINT {name}")).await?;
                }
                simple(conn, format!("RELEASE SAVEPOINT {name}")).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnit {
    fn handle(&self) -> Arc<dyn StoreHandle> {
        Arc::new(PgHandle::Tx(Arc::clone(&self.tx)))
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut unit = self;
        Ok(unit.finish(true).await?)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let mut unit = self;
        Ok(unit.finish(false).await?)
    }
}

impl Drop for PgUnit {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        match self.savepoint.take() {
            // Dropping the sqlx transaction queues its rollback.
            None => {
                if let Ok(mut guard) = self.tx.conn.try_lock() {
                    guard.take();
                }
            }
            Some(name) => self.tx.abandon(name),
        }
    }
}
