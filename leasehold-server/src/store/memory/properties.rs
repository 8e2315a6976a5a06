use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Property, PropertyFilter};
use uuid::Uuid;

use super::{MemoryStore, Replace};
use crate::context::RequestContext;
use crate::store::{PropertyRepoError, PropertyRepository};

pub(crate) struct MemoryProperties {
    store: MemoryStore,
}

impl MemoryProperties {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PropertyRepository for MemoryProperties {
    async fn create(
        &self,
        ctx: &RequestContext,
        property: &Property,
    ) -> Result<(), PropertyRepoError> {
        let property = property.clone();
        Ok(self
            .store
            .with_tables(ctx, move |t| t.properties.insert(property))
            .await??)
    }

    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Property, PropertyRepoError> {
        self.store
            .with_tables(ctx, |t| t.properties.get(id))
            .await?
            .ok_or(PropertyRepoError::NotFound)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &PropertyFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Property>, u64), PropertyRepoError> {
        let PropertyFilter { owner_id, kind } = filter.clone();
        let matches = move |p: &Property| {
            owner_id.map_or(true, |id| p.owner_id == Some(id)) && kind.map_or(true, |k| p.kind == k)
        };
        Ok(self
            .store
            .with_tables(ctx, |t| t.properties.page(matches, limit, offset))
            .await?)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        property: &Property,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), PropertyRepoError> {
        let outcome = self
            .store
            .with_tables(ctx, |t| t.properties.replace(property, expected_updated_at))
            .await?;
        match outcome {
            Replace::Done => Ok(()),
            Replace::Missing => Err(PropertyRepoError::NotFound),
            Replace::Stale => Err(PropertyRepoError::Stale),
        }
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), PropertyRepoError> {
        let removed = self
            .store
            .with_tables(ctx, |t| t.properties.remove(id))
            .await?;
        if removed {
            Ok(())
        } else {
            Err(PropertyRepoError::NotFound)
        }
    }
}
