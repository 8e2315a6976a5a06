//! Classified errors rendered as JSON envelopes
//!
//! `{ "success": false, "error": <message>, "code": <kind>, "details"?: [...] }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use leasehold_core::{AppError, ErrorKind, ValidationError, ValidationErrors};
use serde_json::json;

/// Handler error. Wraps the service taxonomy so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let kind = err.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if kind == ErrorKind::Internal {
            // Log the whole chain, return a generic message
            tracing::error!(error = %err, causes = ?err.causes(), "internal error");
            "Internal server error".to_string()
        } else {
            tracing::debug!(code = kind.code(), error = %err, "request failed");
            err.message().to_string()
        };

        let mut body = json!({
            "success": false,
            "error": message,
            "code": kind.code(),
        });
        if !err.details().is_empty() {
            body["details"] = json!(err.details());
        }

        (status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self(e.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(ValidationErrors::from(e).into())
    }
}
