use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{User, UserFilter};
use uuid::Uuid;

use super::StorageError;
use crate::context::RequestContext;

#[derive(Debug, thiserror::Error)]
pub enum UserRepoError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("user changed since it was read")]
    Stale,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert `user` as given. A taken email is `EmailTaken`.
    async fn create(&self, ctx: &RequestContext, user: &User) -> Result<(), UserRepoError>;

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, UserRepoError>;

    async fn get_by_email(&self, ctx: &RequestContext, email: &str)
        -> Result<User, UserRepoError>;

    /// Newest first, with the total number of matches.
    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &UserFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<User>, u64), UserRepoError>;

    /// Replace the stored record if its `updated_at` still equals `expected_updated_at`.
    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), UserRepoError>;

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), UserRepoError>;
}
