use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Lease, LeaseFilter};
use uuid::Uuid;

use super::StorageError;
use crate::context::RequestContext;

#[derive(Debug, thiserror::Error)]
pub enum LeaseRepoError {
    #[error("lease not found")]
    NotFound,

    /// The property already has another active lease.
    #[error("property already has an active lease")]
    ActiveLeaseExists,

    #[error("lease changed since it was read")]
    Stale,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait LeaseRepository: Send + Sync {
    async fn create(&self, ctx: &RequestContext, lease: &Lease) -> Result<(), LeaseRepoError>;

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Lease, LeaseRepoError>;

    /// The property's active lease, or `NotFound`.
    async fn find_active_for_property(
        &self,
        ctx: &RequestContext,
        property_id: Uuid,
    ) -> Result<Lease, LeaseRepoError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &LeaseFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Lease>, u64), LeaseRepoError>;

    async fn update(
        &self,
        ctx: &RequestContext,
        lease: &Lease,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), LeaseRepoError>;

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), LeaseRepoError>;
}
