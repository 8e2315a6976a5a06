//! Route handlers organized by resource

pub mod health;
pub mod leases;
pub mod onboarding;
pub mod properties;
pub mod users;
