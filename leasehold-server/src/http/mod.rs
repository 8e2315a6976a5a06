//! HTTP transport adapter
//!
//! Axum server with:
//! - `/api/v1` JSON routes over [`Services`](crate::service::Services)
//! - a uniform success/error envelope
//! - request ids, tracing, timeouts, CORS and security headers
//! - graceful shutdown that cancels in-flight request contexts

pub mod error;
pub mod extractors;
pub mod response;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use response::ApiResponse;
pub use server::{build_router, run_server, AppState, ServerError};
