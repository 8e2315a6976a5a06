use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{User, UserFilter};
use uuid::Uuid;

use super::{MemoryStore, Replace};
use crate::context::RequestContext;
use crate::store::{UserRepoError, UserRepository};

pub(crate) struct MemoryUsers {
    store: MemoryStore,
}

impl MemoryUsers {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn create(&self, ctx: &RequestContext, user: &User) -> Result<(), UserRepoError> {
        let user = user.clone();
        self.store
            .with_tables(ctx, move |t| {
                if t.users.any(|u| u.email == user.email) {
                    return Err(UserRepoError::EmailTaken);
                }
                Ok(t.users.insert(user)?)
            })
            .await?
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, UserRepoError> {
        self.store
            .with_tables(ctx, |t| t.users.get(id))
            .await?
            .ok_or(UserRepoError::NotFound)
    }

    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<User, UserRepoError> {
        self.store
            .with_tables(ctx, |t| t.users.find(|u| u.email == email))
            .await?
            .ok_or(UserRepoError::NotFound)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &UserFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<User>, u64), UserRepoError> {
        let role = filter.role;
        Ok(self
            .store
            .with_tables(ctx, |t| {
                t.users
                    .page(|u| role.map_or(true, |r| u.role == r), limit, offset)
            })
            .await?)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), UserRepoError> {
        self.store
            .with_tables(ctx, |t| {
                if t.users.any(|u| u.email == user.email && u.id != user.id) {
                    return Err(UserRepoError::EmailTaken);
                }
                match t.users.replace(user, expected_updated_at) {
                    Replace::Done => Ok(()),
                    Replace::Missing => Err(UserRepoError::NotFound),
                    Replace::Stale => Err(UserRepoError::Stale),
                }
            })
            .await?
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), UserRepoError> {
        let removed = self.store.with_tables(ctx, |t| t.users.remove(id)).await?;
        if removed {
            Ok(())
        } else {
            Err(UserRepoError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreHandle;
    use leasehold_core::clock;
    use leasehold_core::model::Role;

    fn user(name: &str, email: &str, role: Role) -> User {
        let now = clock::now();
        User {
            id: clock::new_id(),
            name: name.into(),
            email: email.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let repo = MemoryStore::new().users();
        let ctx = RequestContext::background();

        repo.create(&ctx, &user("Ann", "ann@x.com", Role::User))
            .await
            .unwrap();
        let err = repo
            .create(&ctx, &user("Ann Two", "ann@x.com", Role::Guest))
            .await
            .unwrap_err();

        assert!(matches!(err, UserRepoError::EmailTaken));
        let (_, total) = repo
            .list(&ctx, &UserFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn update_detects_stale_and_missing() {
        let repo = MemoryStore::new().users();
        let ctx = RequestContext::background();
        let mut ann = user("Ann", "ann@x.com", Role::User);
        repo.create(&ctx, &ann).await.unwrap();

        let prior = ann.updated_at;
        ann.name = "Annie".into();
        ann.updated_at = prior + chrono::Duration::seconds(1);
        repo.update(&ctx, &ann, prior).await.unwrap();

        let err = repo.update(&ctx, &ann, prior).await.unwrap_err();
        assert!(matches!(err, UserRepoError::Stale));

        repo.delete(&ctx, ann.id).await.unwrap();
        let err = repo.update(&ctx, &ann, ann.updated_at).await.unwrap_err();
        assert!(matches!(err, UserRepoError::NotFound));
    }

    #[tokio::test]
    async fn second_writer_from_same_read_is_stale_despite_clock_skew() {
        let repo = MemoryStore::new().users();
        let ctx = RequestContext::background();
        let mut ann = user("Ann", "ann@x.com", Role::User);
        ann.created_at = clock::now() + chrono::Duration::hours(1);
        ann.updated_at = ann.created_at;
        repo.create(&ctx, &ann).await.unwrap();

        let prior = ann.updated_at;
        let mut first = repo.get_by_id(&ctx, ann.id).await.unwrap();
        let mut second = first.clone();

        first.name = "Writer A".into();
        first.updated_at = clock::advance(prior);
        repo.update(&ctx, &first, prior).await.unwrap();

        second.role = Role::Admin;
        second.updated_at = clock::advance(prior);
        let err = repo.update(&ctx, &second, prior).await.unwrap_err();
        assert!(matches!(err, UserRepoError::Stale));

        let stored = repo.get_by_id(&ctx, ann.id).await.unwrap();
        assert_eq!(stored.name, "Writer A");
        assert_eq!(stored.role, Role::User);
    }

    #[tokio::test]
    async fn list_filters_by_role() {
        let repo = MemoryStore::new().users();
        let ctx = RequestContext::background();
        repo.create(&ctx, &user("Ann", "ann@x.com", Role::Admin))
            .await
            .unwrap();
        repo.create(&ctx, &user("Bea", "bea@x.com", Role::User))
            .await
            .unwrap();

        let filter = UserFilter {
            role: Some(Role::Admin),
        };
        let (items, total) = repo.list(&ctx, &filter, 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].name, "Ann");
    }
}
