//! Classified error taxonomy.
//!
//! Every failure that crosses the service boundary is an [`AppError`] with one
//! of six [`ErrorKind`]s. The message is safe to show to API clients (except for
//! `Internal`, which the transport layer replaces with a generic message); the
//! optional source is for logs only.

use serde::Serialize;
use thiserror::Error;

use crate::validation::{FieldError, ValidationErrors};

/// Boxed error used to carry a diagnostic cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;

/// Closed set of error classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced entity does not exist
    NotFound,
    /// Uniqueness or business-rule violation
    Conflict,
    /// Malformed or semantically invalid input
    Invalid,
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but not permitted
    Forbidden,
    /// Unexpected failure (storage error, bug)
    Internal,
}

impl ErrorKind {
    /// Stable wire code used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal",
        }
    }

    /// HTTP status code for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Invalid => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Internal => 500,
        }
    }
}

/// Classified application error
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    details: Vec<FieldError>,
    #[source]
    source: Option<BoxError>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Per-field validation failures, empty unless built from `ValidationErrors`.
    pub fn details(&self) -> &[FieldError] {
        &self.details
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Messages of the whole cause chain, outermost first (excluding self).
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut next = std::error::Error::source(self);
        while let Some(err) = next {
            causes.push(err.to_string());
            next = err.source();
        }
        causes
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut err = Self::invalid(errors.to_string());
        err.details = errors.field_errors();
        err
    }
}
