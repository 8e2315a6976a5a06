//! Orchestration services
//!
//! Services own ids, timestamps and business rules; stores only persist.
//! [`Services`] is the whole graph built from one [`StoreHandle`], either the
//! root store or an open unit of work, so the same services run inside and
//! outside a transaction.

mod leases;
mod properties;
mod users;

use std::future::Future;
use std::sync::Arc;

use leasehold_core::model::{
    Lease, LeaseStatus, NewLease, OnboardTenantInput, Renewal, RenewLeaseInput, Tenancy,
};
use leasehold_core::{AppError, AppResult, BoxError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::store::{MemoryStore, PgHandle, StoreHandle};

pub use leases::LeaseService;
pub use properties::PropertyService;
pub use users::UserService;

/// Log a storage failure and hide it behind an `Internal` error.
pub(crate) fn storage_failure(message: &'static str, err: impl Into<BoxError>) -> AppError {
    let err = AppError::internal(message).with_source(err);
    tracing::error!(error = %err, causes = ?err.causes(), "storage failure");
    err
}

/// Service graph bound to one store handle
#[derive(Clone)]
pub struct Services {
    store: Arc<dyn StoreHandle>,
    pub users: UserService,
    pub properties: PropertyService,
    pub leases: LeaseService,
}

impl Services {
    pub fn new(store: Arc<dyn StoreHandle>) -> Self {
        let users = store.users();
        let properties = store.properties();
        let leases = store.leases();

        Self {
            users: UserService::new(Arc::clone(&users)),
            properties: PropertyService::new(Arc::clone(&properties), Arc::clone(&users)),
            leases: LeaseService::new(leases, properties, users),
            store,
        }
    }

    /// Services over a fresh, empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgHandle::new(pool)))
    }

    /// Run `f` with services bound to a new unit of work.
    ///
    /// Commits when `f` returns `Ok` and rolls back when it returns `Err`, in
    /// which case the closure's error is returned unchanged. Called on services
    /// that are already transactional, the unit is a savepoint. Dropping the
    /// returned future rolls back.
    pub async fn transaction<T, F, Fut>(&self, ctx: &RequestContext, f: F) -> AppResult<T>
    where
        F: FnOnce(Services, RequestContext) -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
        T: Send,
    {
        let unit = self
            .store
            .begin(ctx)
            .await
            .map_err(|err| storage_failure("Failed to begin transaction", err))?;

        let tx = Services::new(unit.handle());
        match f(tx, ctx.clone()).await {
            Ok(value) => {
                unit.commit()
                    .await
                    .map_err(|err| storage_failure("Failed to commit transaction", err))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = unit.rollback().await {
                    tracing::error!(error = %err, "rollback failed after error");
                    return Err(storage_failure("Failed to roll back transaction", rollback));
                }
                tracing::debug!(code = err.kind().code(), "transaction rolled back");
                Err(err)
            }
        }
    }

    /// Create a tenant and their first lease, or neither.
    #[tracing::instrument(skip(self, ctx, input), fields(property_id = %input.lease.property_id))]
    pub async fn onboard_tenant(
        &self,
        ctx: &RequestContext,
        input: OnboardTenantInput,
    ) -> AppResult<Tenancy> {
        self.transaction(ctx, |tx, ctx| async move {
            let tenant = tx.users.create(&ctx, input.tenant).await?;
            let lease = tx
                .leases
                .create(
                    &ctx,
                    NewLease {
                        property_id: input.lease.property_id,
                        tenant_id: tenant.id,
                        start_date: input.lease.start_date,
                        end_date: input.lease.end_date,
                        monthly_rent_cents: input.lease.monthly_rent_cents,
                        status: LeaseStatus::Active,
                    },
                )
                .await?;

            tracing::info!(tenant_id = %tenant.id, lease_id = %lease.id, "tenant onboarded");
            Ok(Tenancy { tenant, lease })
        })
        .await
    }

    /// Terminate an active lease and start its successor atomically.
    ///
    /// The only public way to renew; the two-write step is not exposed on
    /// [`LeaseService`]:
    ///
    /// ```compile_fail
    /// # async fn renew(
    /// #     services: leasehold_server::Services,
    /// #     ctx: leasehold_server::RequestContext,
    /// #     id: uuid::Uuid,
    /// #     input: leasehold_core::model::RenewLeaseInput,
    /// # ) {
    /// let _ = services.leases.renew(&ctx, id, input).await;
    /// # }
    /// ```
    #[tracing::instrument(skip(self, ctx, input))]
    pub async fn renew_lease(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: RenewLeaseInput,
    ) -> AppResult<Renewal> {
        self.transaction(ctx, |tx, ctx| async move { tx.leases.renew(&ctx, id, input).await })
            .await
    }

    /// Create a lease with its existence and active-lease checks in one unit of work.
    pub async fn create_lease(
        &self,
        ctx: &RequestContext,
        input: NewLease,
    ) -> AppResult<Lease> {
        self.transaction(ctx, |tx, ctx| async move { tx.leases.create(&ctx, input).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use leasehold_core::model::{
        NewProperty, NewUser, PropertyKind, Role, TenantLease, UserFilter,
    };
    use leasehold_core::{ErrorKind, PageRequest};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            role: Role::User,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn property(services: &Services) -> Uuid {
        services
            .properties
            .create(
                &ctx(),
                NewProperty {
                    owner_id: None,
                    name: "Harbour View".into(),
                    address: "1 Quay St".into(),
                    kind: PropertyKind::Apartment,
                    description: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn user_count(services: &Services) -> u64 {
        services
            .users
            .list(&ctx(), UserFilter::default(), PageRequest::default())
            .await
            .unwrap()
            .total
    }

    #[tokio::test]
    async fn transaction_commits_on_ok() {
        let services = Services::in_memory();

        let ann = services
            .transaction(&ctx(), |tx, ctx| async move {
                tx.users.create(&ctx, new_user("Ann", "ann@x.com")).await
            })
            .await
            .unwrap();

        assert_eq!(services.users.get(&ctx(), ann.id).await.unwrap(), ann);
    }

    #[tokio::test]
    async fn failing_second_step_leaves_no_trace_of_first() {
        let services = Services::in_memory();

        let err = services
            .transaction(&ctx(), |tx, ctx| async move {
                tx.users.create(&ctx, new_user("Ann", "ann@x.com")).await?;
                Err::<(), _>(AppError::invalid("second step rejected"))
            })
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Invalid));
        assert_eq!(err.message(), "second step rejected");
        assert_eq!(user_count(&services).await, 0);
    }

    #[tokio::test]
    async fn nested_failure_rolls_back_only_the_savepoint() {
        let services = Services::in_memory();

        services
            .transaction(&ctx(), |tx, ctx| async move {
                tx.users.create(&ctx, new_user("Ann", "ann@x.com")).await?;

                let inner = tx
                    .transaction(&ctx, |tx, ctx| async move {
                        tx.users.create(&ctx, new_user("Bea", "bea@x.com")).await?;
                        Err::<(), _>(AppError::conflict("nope"))
                    })
                    .await;
                assert!(inner.unwrap_err().is(ErrorKind::Conflict));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(user_count(&services).await, 1);
    }

    #[tokio::test]
    async fn onboarding_creates_tenant_and_lease() {
        let services = Services::in_memory();
        let property_id = property(&services).await;

        let tenancy = services
            .onboard_tenant(
                &ctx(),
                OnboardTenantInput {
                    tenant: new_user("Ann", "ann@x.com"),
                    lease: TenantLease {
                        property_id,
                        start_date: date(2025, 1, 1),
                        end_date: None,
                        monthly_rent_cents: 150_000,
                    },
                },
            )
            .await
            .unwrap();

        assert_eq!(tenancy.lease.tenant_id, tenancy.tenant.id);
        assert_eq!(tenancy.lease.status, LeaseStatus::Active);
        assert_eq!(user_count(&services).await, 1);
    }

    #[tokio::test]
    async fn onboarding_with_invalid_lease_creates_no_tenant() {
        let services = Services::in_memory();
        let property_id = property(&services).await;

        let err = services
            .onboard_tenant(
                &ctx(),
                OnboardTenantInput {
                    tenant: new_user("Ann", "ann@x.com"),
                    lease: TenantLease {
                        property_id,
                        start_date: date(2025, 6, 1),
                        end_date: Some(date(2025, 1, 1)),
                        monthly_rent_cents: 150_000,
                    },
                },
            )
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Invalid));
        assert_eq!(user_count(&services).await, 0);
    }

    #[tokio::test]
    async fn onboarding_to_missing_property_is_not_found() {
        let services = Services::in_memory();

        let err = services
            .onboard_tenant(
                &ctx(),
                OnboardTenantInput {
                    tenant: new_user("Ann", "ann@x.com"),
                    lease: TenantLease {
                        property_id: Uuid::now_v7(),
                        start_date: date(2025, 1, 1),
                        end_date: None,
                        monthly_rent_cents: 150_000,
                    },
                },
            )
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::NotFound));
        assert_eq!(user_count(&services).await, 0);
    }

    #[tokio::test]
    async fn renewal_replaces_active_lease() {
        let services = Services::in_memory();
        let property_id = property(&services).await;
        let tenancy = services
            .onboard_tenant(
                &ctx(),
                OnboardTenantInput {
                    tenant: new_user("Ann", "ann@x.com"),
                    lease: TenantLease {
                        property_id,
                        start_date: date(2025, 1, 1),
                        end_date: Some(date(2025, 12, 31)),
                        monthly_rent_cents: 150_000,
                    },
                },
            )
            .await
            .unwrap();

        let renewal = services
            .renew_lease(
                &ctx(),
                tenancy.lease.id,
                RenewLeaseInput {
                    start_date: date(2026, 1, 1),
                    end_date: Some(date(2026, 12, 31)),
                    monthly_rent_cents: Some(160_000),
                },
            )
            .await
            .unwrap();

        assert_eq!(renewal.previous.status, LeaseStatus::Terminated);
        assert_eq!(renewal.previous.end_date, Some(date(2026, 1, 1)));
        assert_eq!(renewal.current.status, LeaseStatus::Active);
        assert_eq!(renewal.current.tenant_id, tenancy.tenant.id);
        assert_eq!(renewal.current.monthly_rent_cents, 160_000);

        let active = services
            .leases
            .get(&ctx(), renewal.current.id)
            .await
            .unwrap();
        assert!(active.is_active());
    }

    #[tokio::test]
    async fn failed_renewal_keeps_current_lease_active() {
        let services = Services::in_memory();
        let property_id = property(&services).await;
        let tenancy = services
            .onboard_tenant(
                &ctx(),
                OnboardTenantInput {
                    tenant: new_user("Ann", "ann@x.com"),
                    lease: TenantLease {
                        property_id,
                        start_date: date(2025, 1, 1),
                        end_date: None,
                        monthly_rent_cents: 150_000,
                    },
                },
            )
            .await
            .unwrap();

        let err = services
            .renew_lease(
                &ctx(),
                tenancy.lease.id,
                RenewLeaseInput {
                    start_date: date(2026, 1, 1),
                    end_date: Some(date(2025, 1, 1)),
                    monthly_rent_cents: None,
                },
            )
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Invalid));
        let lease = services.leases.get(&ctx(), tenancy.lease.id).await.unwrap();
        assert!(lease.is_active());
        assert_eq!(lease, tenancy.lease);
    }

    #[tokio::test]
    async fn cancelled_context_fails_to_begin() {
        let services = Services::in_memory();
        let ctx = ctx();
        ctx.cancel();

        let err = services
            .transaction(&ctx, |_, _| async move { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Internal));
    }

    /// Memory store whose units can refuse to finish and whose user
    /// updates can always lose the optimistic race.
    mod faulty {
        use async_trait::async_trait;
        use chrono::{DateTime, Utc};
        use leasehold_core::model::{User, UserFilter};

        use super::*;
        use crate::store::{
            LeaseRepository, PropertyRepository, StorageError, UnitOfWork, UserRepoError,
            UserRepository,
        };

        #[derive(Clone, Copy, Default)]
        pub struct Faults {
            pub commit: bool,
            pub rollback: bool,
            pub stale_users: bool,
        }

        #[derive(Clone, Default)]
        pub struct FaultyStore {
            pub inner: MemoryStore,
            pub faults: Faults,
        }

        #[async_trait]
        impl StoreHandle for FaultyStore {
            fn users(&self) -> Arc<dyn UserRepository> {
                let inner = self.inner.users();
                if self.faults.stale_users {
                    Arc::new(StaleUsers { inner })
                } else {
                    inner
                }
            }

            fn properties(&self) -> Arc<dyn PropertyRepository> {
                self.inner.properties()
            }

            fn leases(&self) -> Arc<dyn LeaseRepository> {
                self.inner.leases()
            }

            async fn begin(
                &self,
                ctx: &RequestContext,
            ) -> Result<Box<dyn UnitOfWork>, StorageError> {
                let inner = self.inner.begin(ctx).await?;
                Ok(Box::new(FaultyUnit {
                    inner,
                    faults: self.faults,
                }))
            }
        }

        struct FaultyUnit {
            inner: Box<dyn UnitOfWork>,
            faults: Faults,
        }

        #[async_trait]
        impl UnitOfWork for FaultyUnit {
            fn handle(&self) -> Arc<dyn StoreHandle> {
                self.inner.handle()
            }

            // A refused unit is dropped, which discards its writes.
            async fn commit(self: Box<Self>) -> Result<(), StorageError> {
                if self.faults.commit {
                    return Err(StorageError::query("commit refused"));
                }
                self.inner.commit().await
            }

            async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
                if self.faults.rollback {
                    return Err(StorageError::query("rollback refused"));
                }
                self.inner.rollback().await
            }
        }

        struct StaleUsers {
            inner: Arc<dyn UserRepository>,
        }

        #[async_trait]
        impl UserRepository for StaleUsers {
            async fn create(&self, ctx: &RequestContext, user: &User) -> Result<(), UserRepoError> {
                self.inner.create(ctx, user).await
            }

            async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, UserRepoError> {
                self.inner.get_by_id(ctx, id).await
            }

            async fn get_by_email(
                &self,
                ctx: &RequestContext,
                email: &str,
            ) -> Result<User, UserRepoError> {
                self.inner.get_by_email(ctx, email).await
            }

            async fn list(
                &self,
                ctx: &RequestContext,
                filter: &UserFilter,
                limit: u32,
                offset: u64,
            ) -> Result<(Vec<User>, u64), UserRepoError> {
                self.inner.list(ctx, filter, limit, offset).await
            }

            async fn update(
                &self,
                _ctx: &RequestContext,
                _user: &User,
                _expected_updated_at: DateTime<Utc>,
            ) -> Result<(), UserRepoError> {
                Err(UserRepoError::Stale)
            }

            async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), UserRepoError> {
                self.inner.delete(ctx, id).await
            }
        }
    }

    fn faulty(faults: faulty::Faults) -> (Services, Services) {
        let store = faulty::FaultyStore {
            inner: MemoryStore::new(),
            faults,
        };
        let plain = Services::new(Arc::new(store.inner.clone()));
        (Services::new(Arc::new(store)), plain)
    }

    #[tokio::test]
    async fn failed_rollback_is_internal() {
        let (services, plain) = faulty(faulty::Faults {
            rollback: true,
            ..Default::default()
        });

        let err = services
            .transaction(&ctx(), |tx, ctx| async move {
                tx.users.create(&ctx, new_user("Ann", "ann@x.com")).await?;
                Err::<(), _>(AppError::invalid("second step rejected"))
            })
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Internal));
        assert_eq!(err.message(), "Failed to roll back transaction");
        assert!(err.causes().iter().any(|c| c.contains("rollback refused")));
        assert_eq!(user_count(&plain).await, 0);
    }

    #[tokio::test]
    async fn failed_commit_is_internal() {
        let (services, plain) = faulty(faulty::Faults {
            commit: true,
            ..Default::default()
        });

        let err = services
            .transaction(&ctx(), |tx, ctx| async move {
                tx.users.create(&ctx, new_user("Ann", "ann@x.com")).await
            })
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Internal));
        assert_eq!(err.message(), "Failed to commit transaction");
        assert_eq!(user_count(&plain).await, 0);
    }

    #[tokio::test]
    async fn stale_user_update_is_conflict() {
        let (services, _) = faulty(faulty::Faults {
            stale_users: true,
            ..Default::default()
        });
        let ann = services
            .users
            .create(&ctx(), new_user("Ann", "ann@x.com"))
            .await
            .unwrap();

        let err = services
            .users
            .update(
                &ctx(),
                ann.id,
                leasehold_core::model::UserUpdate {
                    name: leasehold_core::Patch::Value("Annie".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Conflict));
        assert_eq!(err.message(), "User was modified concurrently");
        assert_eq!(services.users.get(&ctx(), ann.id).await.unwrap().name, "Ann");
    }
}
