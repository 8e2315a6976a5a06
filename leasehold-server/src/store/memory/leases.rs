use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Lease, LeaseFilter};
use uuid::Uuid;

use super::{MemoryStore, Replace, Table};
use crate::context::RequestContext;
use crate::store::{LeaseRepoError, LeaseRepository};

pub(crate) struct MemoryLeases {
    store: MemoryStore,
}

impl MemoryLeases {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

/// Partial unique index: one active lease per property.
fn conflicts_with_active(leases: &Table<Lease>, lease: &Lease) -> bool {
    lease.is_active()
        && leases.any(|l| l.is_active() && l.property_id == lease.property_id && l.id != lease.id)
}

#[async_trait]
impl LeaseRepository for MemoryLeases {
    async fn create(&self, ctx: &RequestContext, lease: &Lease) -> Result<(), LeaseRepoError> {
        let lease = lease.clone();
        self.store
            .with_tables(ctx, move |t| {
                if conflicts_with_active(&t.leases, &lease) {
                    return Err(LeaseRepoError::ActiveLeaseExists);
                }
                Ok(t.leases.insert(lease)?)
            })
            .await?
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Lease, LeaseRepoError> {
        self.store
            .with_tables(ctx, |t| t.leases.get(id))
            .await?
            .ok_or(LeaseRepoError::NotFound)
    }

    async fn find_active_for_property(
        &self,
        ctx: &RequestContext,
        property_id: Uuid,
    ) -> Result<Lease, LeaseRepoError> {
        self.store
            .with_tables(ctx, |t| {
                t.leases
                    .find(|l| l.property_id == property_id && l.is_active())
            })
            .await?
            .ok_or(LeaseRepoError::NotFound)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &LeaseFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Lease>, u64), LeaseRepoError> {
        let LeaseFilter {
            property_id,
            tenant_id,
            status,
        } = filter.clone();
        let matches = move |l: &Lease| {
            property_id.map_or(true, |id| l.property_id == id)
                && tenant_id.map_or(true, |id| l.tenant_id == id)
                && status.map_or(true, |s| l.status == s)
        };
        Ok(self
            .store
            .with_tables(ctx, |t| t.leases.page(matches, limit, offset))
            .await?)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        lease: &Lease,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), LeaseRepoError> {
        self.store
            .with_tables(ctx, |t| {
                if !t.leases.contains(lease.id) {
                    return Err(LeaseRepoError::NotFound);
                }
                if conflicts_with_active(&t.leases, lease) {
                    return Err(LeaseRepoError::ActiveLeaseExists);
                }
                match t.leases.replace(lease, expected_updated_at) {
                    Replace::Done => Ok(()),
                    Replace::Missing => Err(LeaseRepoError::NotFound),
                    Replace::Stale => Err(LeaseRepoError::Stale),
                }
            })
            .await?
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), LeaseRepoError> {
        let removed = self
            .store
            .with_tables(ctx, |t| t.leases.remove(id))
            .await?;
        if removed {
            Ok(())
        } else {
            Err(LeaseRepoError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreHandle;
    use chrono::NaiveDate;
    use leasehold_core::clock;
    use leasehold_core::model::LeaseStatus;

    fn lease(property_id: Uuid, status: LeaseStatus) -> Lease {
        let now = clock::now();
        Lease {
            id: clock::new_id(),
            property_id,
            tenant_id: clock::new_id(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            monthly_rent_cents: 120_000,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn one_active_lease_per_property() {
        let repo = MemoryStore::new().leases();
        let ctx = RequestContext::background();
        let property = clock::new_id();

        repo.create(&ctx, &lease(property, LeaseStatus::Active))
            .await
            .unwrap();
        repo.create(&ctx, &lease(property, LeaseStatus::Terminated))
            .await
            .unwrap();
        let err = repo
            .create(&ctx, &lease(property, LeaseStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseRepoError::ActiveLeaseExists));

        repo.create(&ctx, &lease(clock::new_id(), LeaseStatus::Active))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reactivating_conflicts() {
        let repo = MemoryStore::new().leases();
        let ctx = RequestContext::background();
        let property = clock::new_id();

        let mut old = lease(property, LeaseStatus::Terminated);
        repo.create(&ctx, &old).await.unwrap();
        repo.create(&ctx, &lease(property, LeaseStatus::Active))
            .await
            .unwrap();

        let prior = old.updated_at;
        old.status = LeaseStatus::Active;
        let err = repo.update(&ctx, &old, prior).await.unwrap_err();
        assert!(matches!(err, LeaseRepoError::ActiveLeaseExists));
    }

    #[tokio::test]
    async fn find_active_for_property() {
        let repo = MemoryStore::new().leases();
        let ctx = RequestContext::background();
        let property = clock::new_id();

        let err = repo
            .find_active_for_property(&ctx, property)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseRepoError::NotFound));

        let active = lease(property, LeaseStatus::Active);
        repo.create(&ctx, &active).await.unwrap();
        let found = repo.find_active_for_property(&ctx, property).await.unwrap();
        assert_eq!(found, active);
    }
}
