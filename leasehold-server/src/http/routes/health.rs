//! Health check endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::response::{ok, ApiResponse};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
async fn health() -> Json<ApiResponse<Health>> {
    ok(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::http::testing::{app, send};

    #[tokio::test]
    async fn reports_healthy() {
        let (status, body) = send(&app(), Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    }
}
