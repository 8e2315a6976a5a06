use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Property, PropertyFilter};
use uuid::Uuid;

use super::StorageError;
use crate::context::RequestContext;

#[derive(Debug, thiserror::Error)]
pub enum PropertyRepoError {
    #[error("property not found")]
    NotFound,

    #[error("property changed since it was read")]
    Stale,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn create(&self, ctx: &RequestContext, property: &Property)
        -> Result<(), PropertyRepoError>;

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid)
        -> Result<Property, PropertyRepoError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &PropertyFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Property>, u64), PropertyRepoError>;

    async fn update(
        &self,
        ctx: &RequestContext,
        property: &Property,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), PropertyRepoError>;

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), PropertyRepoError>;
}
