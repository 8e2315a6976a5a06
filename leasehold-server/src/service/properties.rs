use std::sync::Arc;

use leasehold_core::model::{NewProperty, Property, PropertyFilter, PropertyUpdate};
use leasehold_core::{clock, AppError, AppResult, Page, PageRequest, Patch};
use uuid::Uuid;

use super::storage_failure;
use crate::context::RequestContext;
use crate::store::{PropertyRepoError, PropertyRepository, UserRepoError, UserRepository};

fn classify(err: PropertyRepoError, action: &'static str) -> AppError {
    match err {
        PropertyRepoError::NotFound => AppError::not_found("Property not found"),
        PropertyRepoError::Stale => {
            tracing::warn!("concurrent property update");
            AppError::conflict("Property was modified concurrently")
        }
        PropertyRepoError::Storage(err) => storage_failure(action, err),
    }
}

#[derive(Clone)]
pub struct PropertyService {
    properties: Arc<dyn PropertyRepository>,
    users: Arc<dyn UserRepository>,
}

impl PropertyService {
    pub fn new(properties: Arc<dyn PropertyRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { properties, users }
    }

    async fn ensure_owner(&self, ctx: &RequestContext, owner_id: Uuid) -> AppResult<()> {
        match self.users.get_by_id(ctx, owner_id).await {
            Ok(_) => Ok(()),
            Err(UserRepoError::NotFound) => Err(AppError::not_found("Owner not found")),
            Err(err) => Err(storage_failure("Failed to fetch owner", err)),
        }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: PropertyFilter,
        page: PageRequest,
    ) -> AppResult<Page<Property>> {
        let (items, total) = self
            .properties
            .list(ctx, &filter, page.limit, page.offset)
            .await
            .map_err(|err| classify(err, "Failed to list properties"))?;
        Ok(Page::new(items, total, page))
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Property> {
        self.properties
            .get_by_id(ctx, id)
            .await
            .map_err(|err| classify(err, "Failed to fetch property"))
    }

    #[tracing::instrument(skip(self, ctx, input), fields(kind = %input.kind))]
    pub async fn create(&self, ctx: &RequestContext, input: NewProperty) -> AppResult<Property> {
        if let Some(owner_id) = input.owner_id {
            self.ensure_owner(ctx, owner_id).await?;
        }

        let now = clock::now();
        let property = Property {
            id: clock::new_id(),
            owner_id: input.owner_id,
            name: input.name,
            address: input.address,
            kind: input.kind,
            description: input.description,
            created_at: now,
            updated_at: now,
        };

        self.properties
            .create(ctx, &property)
            .await
            .map_err(|err| classify(err, "Failed to create property"))?;

        tracing::info!(property_id = %property.id, "property created");
        Ok(property)
    }

    /// Apply `update`. A new owner must exist; clearing the owner is always allowed.
    #[tracing::instrument(skip(self, ctx, update))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        update: PropertyUpdate,
    ) -> AppResult<Property> {
        let mut property = self.get(ctx, id).await?;

        if let Patch::Value(owner_id) = update.owner_id {
            if property.owner_id != Some(owner_id) {
                self.ensure_owner(ctx, owner_id).await?;
            }
        }

        let prior = property.updated_at;
        property.apply(update);
        property.updated_at = clock::advance(prior);

        self.properties
            .update(ctx, &property, prior)
            .await
            .map_err(|err| classify(err, "Failed to update property"))?;
        Ok(property)
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.properties
            .delete(ctx, id)
            .await
            .map_err(|err| classify(err, "Failed to delete property"))?;

        tracing::info!(property_id = %id, "property deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Services;
    use leasehold_core::model::{NewUser, PropertyKind, Role};
    use leasehold_core::ErrorKind;

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn new_property(owner_id: Option<Uuid>) -> NewProperty {
        NewProperty {
            owner_id,
            name: "Harbour View".into(),
            address: "1 Quay St".into(),
            kind: PropertyKind::Condo,
            description: Some("Sea views".into()),
        }
    }

    async fn owner(services: &Services) -> Uuid {
        services
            .users
            .create(
                &ctx(),
                NewUser {
                    name: "Olive".into(),
                    email: "olive@x.com".into(),
                    role: Role::User,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_requires_existing_owner() {
        let services = Services::in_memory();

        let err = services
            .properties
            .create(&ctx(), new_property(Some(clock::new_id())))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
        assert_eq!(err.message(), "Owner not found");

        let owner_id = owner(&services).await;
        let property = services
            .properties
            .create(&ctx(), new_property(Some(owner_id)))
            .await
            .unwrap();
        assert_eq!(
            services.properties.get(&ctx(), property.id).await.unwrap(),
            property
        );
    }

    #[tokio::test]
    async fn null_clears_description_and_owner() {
        let services = Services::in_memory();
        let owner_id = owner(&services).await;
        let property = services
            .properties
            .create(&ctx(), new_property(Some(owner_id)))
            .await
            .unwrap();

        let updated = services
            .properties
            .update(
                &ctx(),
                property.id,
                PropertyUpdate {
                    owner_id: Patch::Null,
                    description: Patch::Null,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.owner_id, None);
        assert_eq!(updated.description, None);
        assert_eq!(updated.name, property.name);
        assert!(updated.updated_at >= property.updated_at);
    }

    #[tokio::test]
    async fn repointing_owner_is_checked() {
        let services = Services::in_memory();
        let property = services
            .properties
            .create(&ctx(), new_property(None))
            .await
            .unwrap();

        let err = services
            .properties
            .update(
                &ctx(),
                property.id,
                PropertyUpdate {
                    owner_id: Patch::Value(clock::new_id()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        let unchanged = services.properties.get(&ctx(), property.id).await.unwrap();
        assert_eq!(unchanged, property);
    }

    #[tokio::test]
    async fn filters_by_owner() {
        let services = Services::in_memory();
        let owner_id = owner(&services).await;
        services
            .properties
            .create(&ctx(), new_property(Some(owner_id)))
            .await
            .unwrap();
        services
            .properties
            .create(&ctx(), new_property(None))
            .await
            .unwrap();

        let page = services
            .properties
            .list(
                &ctx(),
                PropertyFilter {
                    owner_id: Some(owner_id),
                    kind: None,
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].owner_id, Some(owner_id));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let services = Services::in_memory();
        let err = services
            .properties
            .delete(&ctx(), clock::new_id())
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }
}
