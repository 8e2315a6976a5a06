use std::sync::Arc;

use chrono::NaiveDate;
use leasehold_core::model::lease::dates_in_order;
use leasehold_core::model::{
    Lease, LeaseFilter, LeaseStatus, LeaseUpdate, NewLease, Renewal, RenewLeaseInput,
};
use leasehold_core::{clock, AppError, AppResult, Page, PageRequest};
use uuid::Uuid;

use super::storage_failure;
use crate::context::RequestContext;
use crate::store::{
    LeaseRepoError, LeaseRepository, PropertyRepoError, PropertyRepository, UserRepoError,
    UserRepository,
};

const DATES_OUT_OF_ORDER: &str = "end_date must not precede start_date";
const ALREADY_ACTIVE: &str = "Property already has an active lease";

fn classify(err: LeaseRepoError, action: &'static str) -> AppError {
    match err {
        LeaseRepoError::NotFound => AppError::not_found("Lease not found"),
        LeaseRepoError::ActiveLeaseExists => {
            tracing::warn!("active lease already exists");
            AppError::conflict(ALREADY_ACTIVE)
        }
        LeaseRepoError::Stale => {
            tracing::warn!("concurrent lease update");
            AppError::conflict("Lease was modified concurrently")
        }
        LeaseRepoError::Storage(err) => storage_failure(action, err),
    }
}

#[derive(Clone)]
pub struct LeaseService {
    leases: Arc<dyn LeaseRepository>,
    properties: Arc<dyn PropertyRepository>,
    users: Arc<dyn UserRepository>,
}

impl LeaseService {
    pub fn new(
        leases: Arc<dyn LeaseRepository>,
        properties: Arc<dyn PropertyRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            leases,
            properties,
            users,
        }
    }

    async fn ensure_property(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        match self.properties.get_by_id(ctx, id).await {
            Ok(_) => Ok(()),
            Err(PropertyRepoError::NotFound) => Err(AppError::not_found("Property not found")),
            Err(err) => Err(storage_failure("Failed to fetch property", err)),
        }
    }

    async fn ensure_tenant(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        match self.users.get_by_id(ctx, id).await {
            Ok(_) => Ok(()),
            Err(UserRepoError::NotFound) => Err(AppError::not_found("Tenant not found")),
            Err(err) => Err(storage_failure("Failed to fetch tenant", err)),
        }
    }

    /// Conflict if another lease on `property_id` is active.
    async fn ensure_no_other_active(
        &self,
        ctx: &RequestContext,
        property_id: Uuid,
        except: Option<Uuid>,
    ) -> AppResult<()> {
        match self.leases.find_active_for_property(ctx, property_id).await {
            Ok(active) if Some(active.id) == except => Ok(()),
            Ok(_) => {
                tracing::warn!(%property_id, "property already leased");
                Err(AppError::conflict(ALREADY_ACTIVE))
            }
            Err(LeaseRepoError::NotFound) => Ok(()),
            Err(err) => Err(classify(err, "Failed to check active leases")),
        }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: LeaseFilter,
        page: PageRequest,
    ) -> AppResult<Page<Lease>> {
        let (items, total) = self
            .leases
            .list(ctx, &filter, page.limit, page.offset)
            .await
            .map_err(|err| classify(err, "Failed to list leases"))?;
        Ok(Page::new(items, total, page))
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Lease> {
        self.leases
            .get_by_id(ctx, id)
            .await
            .map_err(|err| classify(err, "Failed to fetch lease"))
    }

    /// Create a lease for an existing property and tenant.
    ///
    /// The active-lease pre-check and the insert should share a transaction;
    /// the store's uniqueness rule decides races either way.
    #[tracing::instrument(
        skip(self, ctx, input),
        fields(property_id = %input.property_id, tenant_id = %input.tenant_id)
    )]
    pub async fn create(&self, ctx: &RequestContext, input: NewLease) -> AppResult<Lease> {
        if !dates_in_order(input.start_date, input.end_date) {
            return Err(AppError::invalid(DATES_OUT_OF_ORDER));
        }
        self.ensure_property(ctx, input.property_id).await?;
        self.ensure_tenant(ctx, input.tenant_id).await?;
        if input.status == LeaseStatus::Active {
            self.ensure_no_other_active(ctx, input.property_id, None)
                .await?;
        }

        let now = clock::now();
        let lease = Lease {
            id: clock::new_id(),
            property_id: input.property_id,
            tenant_id: input.tenant_id,
            start_date: input.start_date,
            end_date: input.end_date,
            monthly_rent_cents: input.monthly_rent_cents,
            status: input.status,
            created_at: now,
            updated_at: now,
        };

        self.leases
            .create(ctx, &lease)
            .await
            .map_err(|err| classify(err, "Failed to create lease"))?;

        tracing::info!(lease_id = %lease.id, "lease created");
        Ok(lease)
    }

    #[tracing::instrument(skip(self, ctx, update))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        update: LeaseUpdate,
    ) -> AppResult<Lease> {
        let mut lease = self.get(ctx, id).await?;
        let was_active = lease.is_active();

        let prior = lease.updated_at;
        lease.apply(update);
        lease.updated_at = clock::advance(prior);

        if !dates_in_order(lease.start_date, lease.end_date) {
            return Err(AppError::invalid(DATES_OUT_OF_ORDER));
        }
        if lease.is_active() && !was_active {
            self.ensure_no_other_active(ctx, lease.property_id, Some(lease.id))
                .await?;
        }

        self.persist(ctx, &lease, prior, "Failed to update lease")
            .await?;
        Ok(lease)
    }

    /// End an active lease. The end date defaults to today.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn terminate(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Lease> {
        let mut lease = self.get(ctx, id).await?;
        if !lease.is_active() {
            return Err(AppError::conflict("Lease is not active"));
        }

        let end_date = end_date.unwrap_or_else(clock::today);
        if !dates_in_order(lease.start_date, Some(end_date)) {
            return Err(AppError::invalid(DATES_OUT_OF_ORDER));
        }

        let prior = lease.updated_at;
        lease.end_date = Some(end_date);
        lease.status = LeaseStatus::Terminated;
        lease.updated_at = clock::advance(prior);

        self.persist(ctx, &lease, prior, "Failed to terminate lease")
            .await?;

        tracing::info!(lease_id = %lease.id, %end_date, "lease terminated");
        Ok(lease)
    }

    /// Terminate the current lease on the successor's start date and create
    /// the successor for the same property and tenant.
    ///
    /// Two writes; reached only through [`Services::renew_lease`](super::Services::renew_lease),
    /// which runs it inside a transaction.
    #[tracing::instrument(skip(self, ctx, input))]
    pub(crate) async fn renew(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: RenewLeaseInput,
    ) -> AppResult<Renewal> {
        let current = self.get(ctx, id).await?;
        if !current.is_active() {
            return Err(AppError::conflict("Lease is not active"));
        }
        if input.start_date < current.start_date {
            return Err(AppError::invalid(
                "start_date must not precede the current lease's start_date",
            ));
        }
        if !dates_in_order(input.start_date, input.end_date) {
            return Err(AppError::invalid(DATES_OUT_OF_ORDER));
        }

        let previous = self.terminate(ctx, id, Some(input.start_date)).await?;
        let current = self
            .create(
                ctx,
                NewLease {
                    property_id: current.property_id,
                    tenant_id: current.tenant_id,
                    start_date: input.start_date,
                    end_date: input.end_date,
                    monthly_rent_cents: input
                        .monthly_rent_cents
                        .unwrap_or(current.monthly_rent_cents),
                    status: LeaseStatus::Active,
                },
            )
            .await?;

        Ok(Renewal { previous, current })
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.leases
            .delete(ctx, id)
            .await
            .map_err(|err| classify(err, "Failed to delete lease"))?;

        tracing::info!(lease_id = %id, "lease deleted");
        Ok(())
    }

    async fn persist(
        &self,
        ctx: &RequestContext,
        lease: &Lease,
        prior: chrono::DateTime<chrono::Utc>,
        action: &'static str,
    ) -> AppResult<()> {
        self.leases
            .update(ctx, lease, prior)
            .await
            .map_err(|err| classify(err, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Services;
    use leasehold_core::model::{NewProperty, NewUser, PropertyKind, Role};
    use leasehold_core::{ErrorKind, Patch};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        services: Services,
        property_id: Uuid,
        tenant_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let services = Services::in_memory();
        let tenant_id = services
            .users
            .create(
                &ctx(),
                NewUser {
                    name: "Tess".into(),
                    email: "tess@x.com".into(),
                    role: Role::User,
                },
            )
            .await
            .unwrap()
            .id;
        let property_id = services
            .properties
            .create(
                &ctx(),
                NewProperty {
                    owner_id: None,
                    name: "Harbour View".into(),
                    address: "1 Quay St".into(),
                    kind: PropertyKind::House,
                    description: None,
                },
            )
            .await
            .unwrap()
            .id;
        Fixture {
            services,
            property_id,
            tenant_id,
        }
    }

    impl Fixture {
        fn new_lease(&self, status: LeaseStatus) -> NewLease {
            NewLease {
                property_id: self.property_id,
                tenant_id: self.tenant_id,
                start_date: date(2025, 1, 1),
                end_date: Some(date(2025, 12, 31)),
                monthly_rent_cents: 150_000,
                status,
            }
        }

        fn leases(&self) -> &LeaseService {
            &self.services.leases
        }
    }

    #[tokio::test]
    async fn create_checks_dates_and_references() {
        let f = fixture().await;

        let mut backwards = f.new_lease(LeaseStatus::Active);
        backwards.end_date = Some(date(2024, 1, 1));
        let err = f.leases().create(&ctx(), backwards).await.unwrap_err();
        assert!(err.is(ErrorKind::Invalid));

        let mut no_property = f.new_lease(LeaseStatus::Active);
        no_property.property_id = clock::new_id();
        let err = f.leases().create(&ctx(), no_property).await.unwrap_err();
        assert_eq!(err.message(), "Property not found");

        let mut no_tenant = f.new_lease(LeaseStatus::Active);
        no_tenant.tenant_id = clock::new_id();
        let err = f.leases().create(&ctx(), no_tenant).await.unwrap_err();
        assert_eq!(err.message(), "Tenant not found");

        let mut same_day = f.new_lease(LeaseStatus::Active);
        same_day.end_date = Some(same_day.start_date);
        f.leases().create(&ctx(), same_day).await.unwrap();
    }

    #[tokio::test]
    async fn second_active_lease_conflicts() {
        let f = fixture().await;

        f.leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();
        f.leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Expired))
            .await
            .unwrap();
        let err = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::Conflict));
        assert_eq!(err.message(), ALREADY_ACTIVE);
    }

    #[tokio::test]
    async fn update_revalidates_merged_dates() {
        let f = fixture().await;
        let lease = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();

        let err = f
            .leases()
            .update(
                &ctx(),
                lease.id,
                LeaseUpdate {
                    start_date: Patch::Value(date(2026, 6, 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Invalid));

        let open_ended = f
            .leases()
            .update(
                &ctx(),
                lease.id,
                LeaseUpdate {
                    end_date: Patch::Null,
                    monthly_rent_cents: Patch::Value(175_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(open_ended.end_date, None);
        assert_eq!(open_ended.monthly_rent_cents, 175_000);
        assert_eq!(open_ended.start_date, lease.start_date);
    }

    #[tokio::test]
    async fn reactivating_while_another_is_active_conflicts() {
        let f = fixture().await;
        let old = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Expired))
            .await
            .unwrap();
        f.leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();

        let err = f
            .leases()
            .update(
                &ctx(),
                old.id,
                LeaseUpdate {
                    status: Patch::Value(LeaseStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn terminate_sets_status_and_end_date() {
        let f = fixture().await;
        let lease = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();

        let ended = f
            .leases()
            .terminate(&ctx(), lease.id, Some(date(2025, 6, 30)))
            .await
            .unwrap();
        assert_eq!(ended.status, LeaseStatus::Terminated);
        assert_eq!(ended.end_date, Some(date(2025, 6, 30)));

        let err = f
            .leases()
            .terminate(&ctx(), lease.id, None)
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn terminate_before_start_is_invalid() {
        let f = fixture().await;
        let lease = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();

        let err = f
            .leases()
            .terminate(&ctx(), lease.id, Some(date(2024, 12, 31)))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Invalid));
        assert!(f.leases().get(&ctx(), lease.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn renew_keeps_rent_by_default() {
        let f = fixture().await;
        let lease = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();

        let renewal = f
            .leases()
            .renew(
                &ctx(),
                lease.id,
                RenewLeaseInput {
                    start_date: date(2026, 1, 1),
                    end_date: None,
                    monthly_rent_cents: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(renewal.current.monthly_rent_cents, lease.monthly_rent_cents);
        assert_eq!(renewal.current.property_id, lease.property_id);
        assert_eq!(renewal.previous.end_date, Some(date(2026, 1, 1)));
    }

    #[tokio::test]
    async fn renew_rejects_earlier_start() {
        let f = fixture().await;
        let lease = f
            .leases()
            .create(&ctx(), f.new_lease(LeaseStatus::Active))
            .await
            .unwrap();

        let err = f
            .leases()
            .renew(
                &ctx(),
                lease.id,
                RenewLeaseInput {
                    start_date: date(2024, 1, 1),
                    end_date: None,
                    monthly_rent_cents: None,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Invalid));
    }
}
