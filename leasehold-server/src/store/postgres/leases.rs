use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use leasehold_core::model::{Lease, LeaseFilter, LeaseStatus, Variant};
use sqlx::FromRow;
use uuid::Uuid;

use super::{parse_variant, DbError, PgHandle};
use crate::context::RequestContext;
use crate::store::{LeaseRepoError, LeaseRepository};

/// Partial unique index on `leases(property_id) WHERE status = 'active'`
const ONE_ACTIVE_KEY: &str = "leases_one_active_per_property";

#[derive(Debug, FromRow)]
struct LeaseRow {
    id: Uuid,
    property_id: Uuid,
    tenant_id: Uuid,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    monthly_rent_cents: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaseRow> for Lease {
    type Error = DbError;

    fn try_from(row: LeaseRow) -> Result<Self, DbError> {
        Ok(Lease {
            id: row.id,
            property_id: row.property_id,
            tenant_id: row.tenant_id,
            start_date: row.start_date,
            end_date: row.end_date,
            monthly_rent_cents: row.monthly_rent_cents,
            status: parse_variant::<LeaseStatus>("status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LeasePageRow {
    #[sqlx(flatten)]
    lease: LeaseRow,
    total: i64,
}

pub(crate) struct PgLeases {
    db: PgHandle,
}

impl PgLeases {
    pub(crate) fn new(db: PgHandle) -> Self {
        Self { db }
    }

    async fn count(&self, ctx: &RequestContext, filter: &LeaseFilter) -> Result<u64, DbError> {
        let (total,): (i64,) = self
            .db
            .fetch_one(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT COUNT(*) FROM leases
                    WHERE ($1::uuid IS NULL OR property_id = $1)
                      AND ($2::uuid IS NULL OR tenant_id = $2)
                      AND ($3::text IS NULL OR status = $3)
                    "#,
                )
                .bind(filter.property_id)
                .bind(filter.tenant_id)
                .bind(filter.status.map(|s| s.as_str())),
            )
            .await?;
        Ok(total as u64)
    }
}

#[async_trait]
impl LeaseRepository for PgLeases {
    async fn create(&self, ctx: &RequestContext, lease: &Lease) -> Result<(), LeaseRepoError> {
        let result = self
            .db
            .execute(
                ctx,
                sqlx::query(
                    r#"
                    INSERT INTO leases
                        (id, property_id, tenant_id, start_date, end_date,
                         monthly_rent_cents, status, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(lease.id)
                .bind(lease.property_id)
                .bind(lease.tenant_id)
                .bind(lease.start_date)
                .bind(lease.end_date)
                .bind(lease.monthly_rent_cents)
                .bind(lease.status.as_str())
                .bind(lease.created_at)
                .bind(lease.updated_at),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if err.is_unique_violation(ONE_ACTIVE_KEY) => {
                Err(LeaseRepoError::ActiveLeaseExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Lease, LeaseRepoError> {
        let row: LeaseRow = self
            .db
            .fetch_optional(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, property_id, tenant_id, start_date, end_date,
                           monthly_rent_cents, status, created_at, updated_at
                    FROM leases
                    WHERE id = $1
                    "#,
                )
                .bind(id),
            )
            .await?
            .ok_or(LeaseRepoError::NotFound)?;

        Ok(row.try_into()?)
    }

    async fn find_active_for_property(
        &self,
        ctx: &RequestContext,
        property_id: Uuid,
    ) -> Result<Lease, LeaseRepoError> {
        let row: LeaseRow = self
            .db
            .fetch_optional(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, property_id, tenant_id, start_date, end_date,
                           monthly_rent_cents, status, created_at, updated_at
                    FROM leases
                    WHERE property_id = $1 AND status = 'active'
                    "#,
                )
                .bind(property_id),
            )
            .await?
            .ok_or(LeaseRepoError::NotFound)?;

        Ok(row.try_into()?)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &LeaseFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Lease>, u64), LeaseRepoError> {
        let rows: Vec<LeasePageRow> = self
            .db
            .fetch_all(
                ctx,
                sqlx::query_as(
                    r#"
                    SELECT id, property_id, tenant_id, start_date, end_date,
                           monthly_rent_cents, status, created_at, updated_at,
                           COUNT(*) OVER() AS total
                    FROM leases
                    WHERE ($1::uuid IS NULL OR property_id = $1)
                      AND ($2::uuid IS NULL OR tenant_id = $2)
                      AND ($3::text IS NULL OR status = $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4 OFFSET $5
                    "#,
                )
                .bind(filter.property_id)
                .bind(filter.tenant_id)
                .bind(filter.status.map(|s| s.as_str()))
                .bind(i64::from(limit))
                .bind(i64::try_from(offset).unwrap_or(i64::MAX)),
            )
            .await?;

        let total = match rows.first() {
            Some(row) => row.total as u64,
            None if offset > 0 => self.count(ctx, filter).await?,
            None => 0,
        };

        let leases = rows
            .into_iter()
            .map(|row| Lease::try_from(row.lease))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((leases, total))
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        lease: &Lease,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), LeaseRepoError> {
        let result = self
            .db
            .execute(
                ctx,
                sqlx::query(
                    r#"
                    UPDATE leases
                    SET start_date = $2, end_date = $3, monthly_rent_cents = $4,
                        status = $5, updated_at = $6
                    WHERE id = $1 AND updated_at = $7
                    "#,
                )
                .bind(lease.id)
                .bind(lease.start_date)
                .bind(lease.end_date)
                .bind(lease.monthly_rent_cents)
                .bind(lease.status.as_str())
                .bind(lease.updated_at)
                .bind(expected_updated_at),
            )
            .await;

        let affected = match result {
            Ok(affected) => affected,
            Err(err) if err.is_unique_violation(ONE_ACTIVE_KEY) => {
                return Err(LeaseRepoError::ActiveLeaseExists)
            }
            Err(err) => return Err(err.into()),
        };

        if affected == 0 {
            return Err(if self.db.exists(ctx, "leases", lease.id).await? {
                LeaseRepoError::Stale
            } else {
                LeaseRepoError::NotFound
            });
        }
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), LeaseRepoError> {
        let affected = self
            .db
            .execute(ctx, sqlx::query("DELETE FROM leases WHERE id = $1").bind(id))
            .await?;

        if affected == 0 {
            return Err(LeaseRepoError::NotFound);
        }
        Ok(())
    }
}
