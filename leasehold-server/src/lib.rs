//! leasehold-server: layered backend for users, properties and leases
//!
//! Handler → Service → Repository:
//! - [`store`]: per-entity repositories over Postgres or memory
//! - [`service`]: business rules, ids, timestamps and transactions
//! - [`http`]: axum routes translating requests and errors
//!
//! Every store call carries a [`RequestContext`] for cancellation and deadlines.

pub mod config;
pub mod context;
pub mod db;
pub mod http;
pub mod service;
pub mod store;

pub use config::{ConfigError, Environment, ServerConfig};
pub use context::RequestContext;
pub use http::{build_router, run_server, AppState, ServerError};
pub use service::Services;
