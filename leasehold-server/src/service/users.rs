use std::sync::Arc;

use leasehold_core::model::{NewUser, User, UserFilter, UserUpdate};
use leasehold_core::{clock, AppError, AppResult, Page, PageRequest};
use uuid::Uuid;

use super::storage_failure;
use crate::context::RequestContext;
use crate::store::{UserRepoError, UserRepository};

/// Translate a store signal. `action` names the failed operation for internals.
fn classify(err: UserRepoError, action: &'static str) -> AppError {
    match err {
        UserRepoError::NotFound => AppError::not_found("User not found"),
        UserRepoError::EmailTaken => {
            tracing::warn!("email already registered");
            AppError::conflict("Email already registered")
        }
        UserRepoError::Stale => {
            tracing::warn!("concurrent user update");
            AppError::conflict("User was modified concurrently")
        }
        UserRepoError::Storage(err) => storage_failure(action, err),
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: UserFilter,
        page: PageRequest,
    ) -> AppResult<Page<User>> {
        let (items, total) = self
            .users
            .list(ctx, &filter, page.limit, page.offset)
            .await
            .map_err(|err| classify(err, "Failed to list users"))?;
        Ok(Page::new(items, total, page))
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> AppResult<User> {
        self.users
            .get_by_id(ctx, id)
            .await
            .map_err(|err| classify(err, "Failed to fetch user"))
    }

    #[tracing::instrument(skip(self, ctx, input), fields(role = %input.role))]
    pub async fn create(&self, ctx: &RequestContext, input: NewUser) -> AppResult<User> {
        let now = clock::now();
        let user = User {
            id: clock::new_id(),
            name: input.name,
            email: input.email,
            role: input.role,
            created_at: now,
            updated_at: now,
        };

        self.users
            .create(ctx, &user)
            .await
            .map_err(|err| classify(err, "Failed to create user"))?;

        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Apply `update` to the stored user. An empty update still refreshes `updated_at`.
    #[tracing::instrument(skip(self, ctx, update))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        update: UserUpdate,
    ) -> AppResult<User> {
        let mut user = self.get(ctx, id).await?;
        let prior = user.updated_at;
        user.apply(update);
        user.updated_at = clock::advance(prior);

        self.users
            .update(ctx, &user, prior)
            .await
            .map_err(|err| classify(err, "Failed to update user"))?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.users
            .delete(ctx, id)
            .await
            .map_err(|err| classify(err, "Failed to delete user"))?;

        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}
