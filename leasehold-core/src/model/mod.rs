//! Entities, typed service inputs and their request forms
//!
//! Each entity module holds three layers:
//! - the persisted entity (`User`, `Property`, `Lease`)
//! - typed service inputs (`NewUser`, `UserUpdate`, `UserFilter`, ...)
//! - loose request bodies implementing [`Validate`](crate::Validate)

pub mod lease;
pub mod property;
pub mod user;

pub use lease::{
    CreateLeaseRequest, Lease, LeaseFilter, LeaseListQuery, LeaseStatus, LeaseUpdate, NewLease,
    OnboardTenantInput, OnboardTenantRequest, Renewal, RenewLeaseInput, RenewLeaseRequest,
    TenantLease, Tenancy, TerminateLeaseRequest, UpdateLeaseRequest,
};
pub use property::{
    CreatePropertyRequest, NewProperty, Property, PropertyFilter, PropertyKind,
    PropertyListQuery, PropertyUpdate, UpdatePropertyRequest,
};
pub use user::{
    CreateUserRequest, NewUser, Role, UpdateUserRequest, User, UserFilter, UserListQuery,
    UserUpdate,
};

/// Closed set of string-valued variants (roles, kinds, statuses).
///
/// Stored and transmitted as the lowercase name.
pub trait Variant: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Parse from the wire form, ignoring case and surrounding whitespace.
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }

    /// Accepted values, comma-separated.
    fn expected() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
