//! leasehold-core: domain types for the leasehold backend
//!
//! Shared by the server and CLI crates:
//! - Classified error taxonomy (`AppError`, `ErrorKind`)
//! - Entities and service inputs (users, properties, leases)
//! - Tri-state partial updates (`Patch`)
//! - Field-level validation (`Validate`, `ValidationErrors`)
//! - Pagination types

pub mod clock;
pub mod error;
pub mod model;
pub mod pagination;
pub mod patch;
pub mod validation;

pub use error::{AppError, AppResult, BoxError, ErrorKind};
pub use pagination::{Page, PageRequest};
pub use patch::Patch;
pub use validation::{Validate, ValidationError, ValidationErrors};
