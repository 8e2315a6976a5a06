//! Leases, plus the inputs of the composite tenancy operations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{CreateUserRequest, NewUser, User};
use super::Variant;
use crate::pagination::PageRequest;
use crate::patch::Patch;
use crate::validation::{Validate, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Active,
    Terminated,
    Expired,
}

impl Variant for LeaseStatus {
    const ALL: &'static [Self] = &[Self::Active, Self::Terminated, Self::Expired];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Terminated => "terminated",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: i64,
    pub status: LeaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lease {
    pub fn apply(&mut self, update: LeaseUpdate) {
        update.start_date.apply_to(&mut self.start_date);
        update.end_date.apply_to_option(&mut self.end_date);
        update
            .monthly_rent_cents
            .apply_to(&mut self.monthly_rent_cents);
        update.status.apply_to(&mut self.status);
    }

    pub fn is_active(&self) -> bool {
        self.status == LeaseStatus::Active
    }
}

/// `true` unless the end date precedes the start date.
pub fn dates_in_order(start: NaiveDate, end: Option<NaiveDate>) -> bool {
    end.map_or(true, |end| end >= start)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLease {
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: i64,
    pub status: LeaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseUpdate {
    pub start_date: Patch<NaiveDate>,
    pub end_date: Patch<NaiveDate>,
    pub monthly_rent_cents: Patch<i64>,
    pub status: Patch<LeaseStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseFilter {
    pub property_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub status: Option<LeaseStatus>,
}

/// Lease terms for a tenant created in the same operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantLease {
    pub property_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardTenantInput {
    pub tenant: NewUser,
    pub lease: TenantLease,
}

/// Terms of the successor lease. Rent defaults to the current lease's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewLeaseInput {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: Option<i64>,
}

/// A tenant and their first lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenancy {
    pub tenant: User,
    pub lease: Lease,
}

/// The terminated lease and its successor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    pub previous: Lease,
    pub current: Lease,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateLeaseRequest {
    pub property_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: Option<i64>,
    pub status: Option<String>,
}

impl Validate for CreateLeaseRequest {
    type Valid = NewLease;

    fn validate(self) -> Result<NewLease, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let property_id = errors.required("property_id", self.property_id);
        let tenant_id = errors.required("tenant_id", self.tenant_id);
        let start_date = errors.required("start_date", self.start_date);
        let rent = errors.positive("monthly_rent_cents", self.monthly_rent_cents);
        let status = match self.status {
            None => Some(LeaseStatus::Active),
            status => errors.variant::<LeaseStatus>("status", status),
        };

        match (property_id, tenant_id, start_date, rent, status) {
            (Some(property_id), Some(tenant_id), Some(start_date), Some(monthly_rent_cents), Some(status)) => {
                Ok(NewLease {
                    property_id,
                    tenant_id,
                    start_date,
                    end_date: self.end_date,
                    monthly_rent_cents,
                    status,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLeaseRequest {
    #[serde(default)]
    pub start_date: Patch<NaiveDate>,
    #[serde(default)]
    pub end_date: Patch<NaiveDate>,
    #[serde(default)]
    pub monthly_rent_cents: Patch<i64>,
    #[serde(default)]
    pub status: Patch<String>,
}

impl Validate for UpdateLeaseRequest {
    type Valid = LeaseUpdate;

    fn validate(self) -> Result<LeaseUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let start_date = errors.patch_required("start_date", self.start_date);
        let rent = errors.patch_positive("monthly_rent_cents", self.monthly_rent_cents);
        let status = errors.patch_variant::<LeaseStatus>("status", self.status);

        match (start_date, rent, status) {
            (Some(start_date), Some(monthly_rent_cents), Some(status)) => Ok(LeaseUpdate {
                start_date,
                end_date: self.end_date,
                monthly_rent_cents,
                status,
            }),
            _ => Err(errors),
        }
    }
}

/// Body of `POST /leases/{id}/terminate`; the end date defaults to today.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerminateLeaseRequest {
    pub end_date: Option<NaiveDate>,
}

impl Validate for TerminateLeaseRequest {
    type Valid = Option<NaiveDate>;

    fn validate(self) -> Result<Option<NaiveDate>, ValidationErrors> {
        Ok(self.end_date)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenewLeaseRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: Option<i64>,
}

impl Validate for RenewLeaseRequest {
    type Valid = RenewLeaseInput;

    fn validate(self) -> Result<RenewLeaseInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let start_date = errors.required("start_date", self.start_date);
        let rent = match self.monthly_rent_cents {
            None => Some(None),
            rent => errors.positive("monthly_rent_cents", rent).map(Some),
        };

        match (start_date, rent) {
            (Some(start_date), Some(monthly_rent_cents)) => Ok(RenewLeaseInput {
                start_date,
                end_date: self.end_date,
                monthly_rent_cents,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardTenantRequest {
    #[serde(default)]
    pub tenant: CreateUserRequest,
    pub property_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent_cents: Option<i64>,
}

impl Validate for OnboardTenantRequest {
    type Valid = OnboardTenantInput;

    fn validate(self) -> Result<OnboardTenantInput, ValidationErrors> {
        let tenant = self.tenant.validate();
        let mut errors = match &tenant {
            Ok(_) => ValidationErrors::new(),
            Err(e) => e.clone(),
        };
        let property_id = errors.required("property_id", self.property_id);
        let start_date = errors.required("start_date", self.start_date);
        let rent = errors.positive("monthly_rent_cents", self.monthly_rent_cents);

        match (tenant, property_id, start_date, rent) {
            (Ok(tenant), Some(property_id), Some(start_date), Some(monthly_rent_cents)) => {
                Ok(OnboardTenantInput {
                    tenant,
                    lease: TenantLease {
                        property_id,
                        start_date,
                        end_date: self.end_date,
                        monthly_rent_cents,
                    },
                })
            }
            _ => Err(errors),
        }
    }
}

/// Query string for `GET /leases`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaseListQuery {
    pub property_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl Validate for LeaseListQuery {
    type Valid = (LeaseFilter, PageRequest);

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let status = errors.optional_variant::<LeaseStatus>("status", self.status);
        let page = PageRequest::from_query(self.limit, self.offset);

        match status {
            Some(status) => Ok((
                LeaseFilter {
                    property_id: self.property_id,
                    tenant_id: self.tenant_id,
                    status,
                },
                page,
            )),
            None => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_ordering() {
        assert!(dates_in_order(date(2025, 1, 1), None));
        assert!(dates_in_order(date(2025, 1, 1), Some(date(2025, 1, 1))));
        assert!(dates_in_order(date(2025, 1, 1), Some(date(2025, 12, 31))));
        assert!(!dates_in_order(date(2025, 1, 1), Some(date(2024, 12, 31))));
    }

    #[test]
    fn create_request_defaults_to_active() {
        let req: CreateLeaseRequest = serde_json::from_value(serde_json::json!({
            "property_id": Uuid::nil(),
            "tenant_id": Uuid::nil(),
            "start_date": "2025-01-01",
            "monthly_rent_cents": 150000,
        }))
        .unwrap();
        let lease = req.validate().unwrap();

        assert_eq!(lease.status, LeaseStatus::Active);
        assert_eq!(lease.start_date, date(2025, 1, 1));
        assert_eq!(lease.end_date, None);
    }

    #[test]
    fn create_request_requires_positive_rent() {
        let req = CreateLeaseRequest {
            property_id: Some(Uuid::nil()),
            tenant_id: Some(Uuid::nil()),
            start_date: Some(date(2025, 1, 1)),
            monthly_rent_cents: Some(0),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.has("monthly_rent_cents"));
    }

    #[test]
    fn update_allows_clearing_end_date() {
        let req: UpdateLeaseRequest = serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        let update = req.validate().unwrap();
        assert_eq!(update.end_date, Patch::Null);

        let req: UpdateLeaseRequest = serde_json::from_str(r#"{"status": null}"#).unwrap();
        assert!(req.validate().unwrap_err().has("status"));
    }

    #[test]
    fn onboard_request_merges_tenant_errors() {
        let req: OnboardTenantRequest = serde_json::from_value(serde_json::json!({
            "tenant": {"name": "Ann", "email": "bad", "role": "user"},
            "start_date": "2025-01-01",
            "monthly_rent_cents": 100,
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();

        assert!(errors.has("email"));
        assert!(errors.has("property_id"));
        assert_eq!(errors.len(), 2);
    }
}
