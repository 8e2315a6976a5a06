//! Field-level validation for inbound requests.
//!
//! Request types implement [`Validate`], turning a loosely-typed body into a
//! typed service input or a list of field errors. The transport layer runs it
//! before calling a service; services only check business invariants.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::model::Variant;
use crate::patch::Patch;

/// Maximum length for email addresses
const MAX_EMAIL_LEN: usize = 254;

/// Pragmatic address check: one `@`, no whitespace, a dot in the domain.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex")
});

/// Validation capability: loose input in, typed input or field errors out.
pub trait Validate {
    type Valid;

    fn validate(self) -> Result<Self::Valid, ValidationErrors>;
}

/// Validation error for a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is missing
    Required { field: &'static str },

    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field is shorter than the minimum length
    TooShort { field: &'static str, min: usize },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., email)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// Field was explicitly set to null but cannot be cleared
    NotNullable { field: &'static str },

    /// Numeric value outside the accepted range
    OutOfRange { field: &'static str, reason: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required { field }
            | Self::Empty { field }
            | Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidVariant { field, .. }
            | Self::NotNullable { field }
            | Self::OutOfRange { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required { field } => write!(f, "{} is required", field),
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant {
                field,
                value,
                expected,
            } => {
                write!(
                    f,
                    "invalid {} value: '{}' (expected one of: {})",
                    field, value, expected
                )
            }
            Self::NotNullable { field } => write!(f, "{} cannot be null", field),
            Self::OutOfRange { field, reason } => write!(f, "{}: {}", field, reason),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Wire form of a field error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors found in one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Whether any error was recorded for `field`.
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field() == field)
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        self.0
            .iter()
            .map(|e| FieldError {
                field: e.field(),
                message: e.to_string(),
            })
            .collect()
    }

    /// `Ok(value)` if nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Required value of any type.
    pub fn required<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(ValidationError::Required { field });
        }
        value
    }

    /// Required text, trimmed, with character bounds.
    pub fn text(
        &mut self,
        field: &'static str,
        value: Option<String>,
        min: usize,
        max: usize,
    ) -> Option<String> {
        let value = self.required(field, value)?;
        self.bounded(field, value, min, max)
    }

    /// Optional text; blank input counts as absent.
    pub fn optional_text(
        &mut self,
        field: &'static str,
        value: Option<String>,
        max: usize,
    ) -> Option<Option<String>> {
        match value {
            None => Some(None),
            Some(v) if v.trim().is_empty() => Some(None),
            Some(v) => self.bounded(field, v, 1, max).map(Some),
        }
    }

    /// Patch for a required text field: `null` is rejected.
    pub fn patch_text(
        &mut self,
        field: &'static str,
        value: Patch<String>,
        min: usize,
        max: usize,
    ) -> Option<Patch<String>> {
        match value {
            Patch::Missing => Some(Patch::Missing),
            Patch::Null => {
                self.push(ValidationError::NotNullable { field });
                None
            }
            Patch::Value(v) => self.bounded(field, v, min, max).map(Patch::Value),
        }
    }

    /// Patch for an optional text field: `null` or blank clears it.
    pub fn nullable_patch_text(
        &mut self,
        field: &'static str,
        value: Patch<String>,
        max: usize,
    ) -> Option<Patch<String>> {
        match value {
            Patch::Value(v) if v.trim().is_empty() => Some(Patch::Null),
            Patch::Value(v) => self.bounded(field, v, 1, max).map(Patch::Value),
            other => Some(other),
        }
    }

    /// Patch for a required field of any type: `null` is rejected.
    pub fn patch_required<T>(&mut self, field: &'static str, value: Patch<T>) -> Option<Patch<T>> {
        if matches!(value, Patch::Null) {
            self.push(ValidationError::NotNullable { field });
            return None;
        }
        Some(value)
    }

    /// Required email address, trimmed and lowercased.
    pub fn email(&mut self, field: &'static str, value: Option<String>) -> Option<String> {
        let value = self.text(field, value, 1, MAX_EMAIL_LEN)?;
        if !EMAIL_RE.is_match(&value) {
            self.push(ValidationError::InvalidFormat {
                field,
                reason: "must be a valid email address",
            });
            return None;
        }
        Some(value.to_lowercase())
    }

    /// Required enumerated value.
    pub fn variant<T: Variant>(&mut self, field: &'static str, value: Option<String>) -> Option<T> {
        let value = self.required(field, value)?;
        self.parse_variant(field, &value)
    }

    /// Optional enumerated value (e.g. a list filter).
    pub fn optional_variant<T: Variant>(
        &mut self,
        field: &'static str,
        value: Option<String>,
    ) -> Option<Option<T>> {
        match value {
            None => Some(None),
            Some(v) => self.parse_variant(field, &v).map(Some),
        }
    }

    /// Patch for a required enumerated field.
    pub fn patch_variant<T: Variant>(
        &mut self,
        field: &'static str,
        value: Patch<String>,
    ) -> Option<Patch<T>> {
        match self.patch_required(field, value)? {
            Patch::Value(v) => self.parse_variant(field, &v).map(Patch::Value),
            Patch::Missing => Some(Patch::Missing),
            Patch::Null => None,
        }
    }

    /// Required strictly positive integer.
    pub fn positive(&mut self, field: &'static str, value: Option<i64>) -> Option<i64> {
        let value = self.required(field, value)?;
        self.check_positive(field, value)
    }

    /// Patch for a required strictly positive integer.
    pub fn patch_positive(&mut self, field: &'static str, value: Patch<i64>) -> Option<Patch<i64>> {
        match self.patch_required(field, value)? {
            Patch::Value(v) => self.check_positive(field, v).map(Patch::Value),
            other => Some(other),
        }
    }

    fn bounded(
        &mut self,
        field: &'static str,
        value: String,
        min: usize,
        max: usize,
    ) -> Option<String> {
        let value = value.trim().to_owned();
        let len = value.chars().count();

        if len == 0 {
            self.push(ValidationError::Empty { field });
            return None;
        }
        if len < min {
            self.push(ValidationError::TooShort { field, min });
            return None;
        }
        if len > max {
            self.push(ValidationError::TooLong { field, max });
            return None;
        }
        Some(value)
    }

    fn parse_variant<T: Variant>(&mut self, field: &'static str, value: &str) -> Option<T> {
        let parsed = T::parse(value);
        if parsed.is_none() {
            self.push(ValidationError::InvalidVariant {
                field,
                value: value.to_owned(),
                expected: T::expected(),
            });
        }
        parsed
    }

    fn check_positive(&mut self, field: &'static str, value: i64) -> Option<i64> {
        if value <= 0 {
            self.push(ValidationError::OutOfRange {
                field,
                reason: "must be greater than zero",
            });
            return None;
        }
        Some(value)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}
