//! Entity stores
//!
//! One repository trait per entity, two implementations:
//! - `postgres`: sqlx against a pool or a shared transaction
//! - `memory`: single-lock tables, used as a test double and for demo mode
//!
//! Stores persist exactly what they are given. They never generate ids or
//! timestamps, never call each other, and never apply business rules. Failures
//! are per-entity signals; storage-library errors stay behind
//! [`StorageError`].

pub mod memory;
pub mod postgres;

mod leases;
mod properties;
mod users;

use std::sync::Arc;

use async_trait::async_trait;
use leasehold_core::BoxError;

use crate::context::{Interrupted, RequestContext};

pub use leases::{LeaseRepoError, LeaseRepository};
pub use memory::MemoryStore;
pub use postgres::PgHandle;
pub use properties::{PropertyRepoError, PropertyRepository};
pub use users::{UserRepoError, UserRepository};

/// Opaque storage failure
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage query failed")]
    Query(#[source] BoxError),

    #[error("storage operation cancelled")]
    Cancelled,

    #[error("storage operation timed out")]
    TimedOut,

    #[error("transaction is no longer open")]
    TransactionClosed,
}

impl StorageError {
    pub fn query(err: impl Into<BoxError>) -> Self {
        Self::Query(err.into())
    }
}

impl From<Interrupted> for StorageError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::TimedOut,
        }
    }
}

/// A store bound either to the root connection or to one open unit of work.
///
/// Repositories obtained from the same handle share its transaction.
#[async_trait]
pub trait StoreHandle: Send + Sync + 'static {
    fn users(&self) -> Arc<dyn UserRepository>;
    fn properties(&self) -> Arc<dyn PropertyRepository>;
    fn leases(&self) -> Arc<dyn LeaseRepository>;

    /// Open a transaction, or a savepoint if this handle is already transactional.
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn UnitOfWork>, StorageError>;
}

/// An open transaction or savepoint.
///
/// Dropping it without `commit` or `rollback` discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Handle whose repositories operate inside this unit.
    fn handle(&self) -> Arc<dyn StoreHandle>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
