use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Role, User, UserFilter, Variant};
use sqlx::FromRow;
use uuid::Uuid;

use super::{parse_variant, DbError, PgHandle};
use crate::context::RequestContext;
use crate::store::{UserRepoError, UserRepository};

/// Unique index on `users.email`
const EMAIL_KEY: &str = "users_email_key";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, DbError> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role: parse_variant::<Role>("role", &row.role)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row plus the window count of all matches
#[derive(Debug, FromRow)]
struct UserPageRow {
    #[sqlx(flatten)]
    user: UserRow,
    total: i64,
}

pub(crate) struct PgUsers {
    db: PgHandle,
}

impl PgUsers {
    pub(crate) fn new(db: PgHandle) -> Self {
        Self { db }
    }

    async fn count(&self, ctx: &RequestContext, filter: &UserFilter) -> Result<u64, DbError> {
        let (total,): (i64,) = self
            .db
            .fetch_one(
                ctx,
                sqlx::query_as("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1)")
                    .bind(filter.role.map(|r| r.as_str())),
            )
            .await?;
        Ok(total as u64)
    }
}

#[async_trait]
impl UserRepository for PgUsers {
    async fn create(&self, ctx: &RequestContext, user: &User) -> Result<(), UserRepoError> {
        // Fast path; the unique index below is what actually decides.
        match self.get_by_email(ctx, &user.email).await {
            Ok(_) => return Err(UserRepoError::EmailTaken),
            Err(UserRepoError::NotFound) => {}
            Err(err) => return Err(err),
        }

        let result = self
            .db
            .execute(
                ctx,
                sqlx::query(
                    r#"
                    INSERT INTO users (id, name, email, role, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(user.role.as_str())
                .bind(user.created_at)
                .bind(user.updated_at),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if err.is_unique_violation(EMAIL_KEY) => Err(UserRepoError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, UserRepoError> {
        let row: UserRow = self
            .db
            .fetch_optional(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, name, email, role, created_at, updated_at
                    FROM users
                    WHERE id = $1
                    "#,
                )
                .bind(id),
            )
            .await?
            .ok_or(UserRepoError::NotFound)?;

        Ok(row.try_into()?)
    }

    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<User, UserRepoError> {
        let row: UserRow = self
            .db
            .fetch_optional(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, name, email, role, created_at, updated_at
                    FROM users
                    WHERE email = $1
                    "#,
                )
                .bind(email),
            )
            .await?
            .ok_or(UserRepoError::NotFound)?;

        Ok(row.try_into()?)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &UserFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<User>, u64), UserRepoError> {
        let rows: Vec<UserPageRow> = self
            .db
            .fetch_all(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, name, email, role, created_at, updated_at,
                           COUNT(*) OVER() AS total
                    FROM users
                    WHERE ($1::text IS NULL OR role = $1)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(filter.role.map(|r| r.as_str()))
                .bind(i64::from(limit))
                .bind(i64::try_from(offset).unwrap_or(i64::MAX)),
            )
            .await?;

        // An offset past the end returns no rows, so no window count either.
        // On the pool this count is a separate statement and may see later commits.
        let total = match rows.first() {
            Some(row) => row.total as u64,
            None if offset > 0 => self.count(ctx, filter).await?,
            None => 0,
        };

        let users = rows
            .into_iter()
            .map(|row| User::try_from(row.user))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), UserRepoError> {
        let result = self
            .db
            .execute(
                ctx,
                sqlx::query(
                    r#"
                    UPDATE users
                    SET name = $2, email = $3, role = $4, updated_at = $5
                    WHERE id = $1 AND updated_at = $6
                    "#,
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(user.role.as_str())
                .bind(user.updated_at)
                .bind(expected_updated_at),
            )
            .await;

        let affected = match result {
            Ok(affected) => affected,
            Err(err) if err.is_unique_violation(EMAIL_KEY) => return Err(UserRepoError::EmailTaken),
            Err(err) => return Err(err.into()),
        };

        if affected == 0 {
            return Err(if self.db.exists(ctx, "users", user.id).await? {
                UserRepoError::Stale
            } else {
                UserRepoError::NotFound
            });
        }
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), UserRepoError> {
        let affected = self
            .db
            .execute(ctx, sqlx::query("DELETE FROM users WHERE id = $1").bind(id))
            .await?;

        if affected == 0 {
            return Err(UserRepoError::NotFound);
        }
        Ok(())
    }
}
