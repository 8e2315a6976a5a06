use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Property, PropertyFilter, PropertyKind, Variant};
use sqlx::FromRow;
use uuid::Uuid;

use super::{parse_variant, DbError, PgHandle};
use crate::context::RequestContext;
use crate::store::{PropertyRepoError, PropertyRepository};

#[derive(Debug, FromRow)]
struct PropertyRow {
    id: Uuid,
    owner_id: Option<Uuid>,
    name: String,
    address: String,
    kind: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PropertyRow> for Property {
    type Error = DbError;

    fn try_from(row: PropertyRow) -> Result<Self, DbError> {
        Ok(Property {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            address: row.address,
            kind: parse_variant::<PropertyKind>("kind", &row.kind)?,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PropertyPageRow {
    #[sqlx(flatten)]
    property: PropertyRow,
    total: i64,
}

pub(crate) struct PgProperties {
    db: PgHandle,
}

impl PgProperties {
    pub(crate) fn new(db: PgHandle) -> Self {
        Self { db }
    }

    async fn count(&self, ctx: &RequestContext, filter: &PropertyFilter) -> Result<u64, DbError> {
        let (total,): (i64,) = self
            .db
            .fetch_one(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT COUNT(*) FROM properties
                    WHERE ($1::uuid IS NULL OR owner_id = $1)
                      AND ($2::text IS NULL OR kind = $2)
                    "#,
                )
                .bind(filter.owner_id)
                .bind(filter.kind.map(|k| k.as_str())),
            )
            .await?;
        Ok(total as u64)
    }
}

#[async_trait]
impl PropertyRepository for PgProperties {
    async fn create(
        &self,
        ctx: &RequestContext,
        property: &Property,
    ) -> Result<(), PropertyRepoError> {
        self.db
            .execute(
                ctx,
                sqlx::query(
                    r#"
                    INSERT INTO properties
                        (id, owner_id, name, address, kind, description, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(property.id)
                .bind(property.owner_id)
                .bind(&property.name)
                .bind(&property.address)
                .bind(property.kind.as_str())
                .bind(property.description.as_deref())
                .bind(property.created_at)
                .bind(property.updated_at),
            )
            .await?;
        Ok(())
    }

    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Property, PropertyRepoError> {
        let row: PropertyRow = self
            .db
            .fetch_optional(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, owner_id, name, address, kind, description, created_at, updated_at
                    FROM properties
                    WHERE id = $1
                    "#,
                )
                .bind(id),
            )
            .await?
            .ok_or(PropertyRepoError::NotFound)?;

        Ok(row.try_into()?)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &PropertyFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Property>, u64), PropertyRepoError> {
        let rows: Vec<PropertyPageRow> = self
            .db
            .fetch_all(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, owner_id, name, address, kind, description, created_at, updated_at,
                           COUNT(*) OVER() AS total
                    FROM properties
                    WHERE ($1::uuid IS NULL OR owner_id = $1)
                      AND ($2::text IS NULL OR kind = $2)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $3 OFFSET $4
                    "#,
                )
                .bind(filter.owner_id)
                .bind(filter.kind.map(|k| k.as_str()))
                .bind(i64::from(limit))
                .bind(i64::try_from(offset).unwrap_or(i64::MAX)),
            )
            .await?;

        let total = match rows.first() {
            Some(row) => row.total as u64,
            None if offset > 0 => self.count(ctx, filter).await?,
            None => 0,
        };

        let properties = rows
            .into_iter()
            .map(|row| Property::try_from(row.property))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((properties, total))
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        property: &Property,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), PropertyRepoError> {
        let affected = self
            .db
            .execute(
                ctx,
                sqlx::query(
                    r#"
                    UPDATE properties
                    SET owner_id = $2, name = $3, address = $4, kind = $5,
                        description = $6, updated_at = $7
                    WHERE id = $1 AND updated_at = $8
                    "#,
                )
                .bind(property.id)
                .bind(property.owner_id)
                .bind(&property.name)
                .bind(&property.address)
                .bind(property.kind.as_str())
                .bind(property.description.as_deref())
                .bind(property.updated_at)
                .bind(expected_updated_at),
            )
            .await?;

        if affected == 0 {
            return Err(if self.db.exists(ctx, "properties", property.id).await? {
                PropertyRepoError::Stale
            } else {
                PropertyRepoError::NotFound
            });
        }
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), PropertyRepoError> {
        let affected = self
            .db
            .execute(ctx, sqlx::query("DELETE FROM properties WHERE id = $1").bind(id))
            .await?;

        if affected == 0 {
            return Err(PropertyRepoError::NotFound);
        }
        Ok(())
    }
}
