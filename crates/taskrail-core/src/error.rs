//! Typed failure taxonomy surfaced by the remote gateway.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single field-level validation message from either side of the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable message for that field.
    pub message: String,
}

impl FieldError {
    /// Build a field error from anything string-like.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failures a remote operation can surface to its caller.
///
/// Every gateway call resolves to either a typed value or one of these
/// variants; nothing is swallowed into a silent `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The credential is missing, expired or rejected (HTTP 401).
    #[error("authentication required")]
    Unauthorized,
    /// The server rejected the payload with field-level messages (HTTP 400/422).
    #[error("validation failed: {}", format_fields(.0))]
    ValidationFailed(Vec<FieldError>),
    /// The addressed resource does not exist (HTTP 404).
    #[error("not found")]
    NotFound,
    /// The request conflicts with existing state, e.g. a duplicate email (HTTP 409).
    #[error("{0}")]
    Conflict(String),
    /// The transport failed before an HTTP status was available.
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// The server reported an internal error (HTTP 5xx).
    #[error("server error (status {0})")]
    ServerError(u16),
}

impl ApiError {
    /// Field-level messages carried by a [`ApiError::ValidationFailed`] value.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::ValidationFailed(fields) => fields,
            _ => &[],
        }
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    if fields.is_empty() {
        return "invalid request".to_owned();
    }
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_field() {
        let err = ApiError::ValidationFailed(vec![
            FieldError::new("title", "must not be empty"),
            FieldError::new("priority", "unknown value"),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("title: must not be empty"));
        assert!(rendered.contains("priority: unknown value"));
    }

    #[test]
    fn validation_error_without_fields_has_generic_text() {
        let err = ApiError::ValidationFailed(Vec::new());
        assert_eq!(err.to_string(), "validation failed: invalid request");
    }

    #[test]
    fn field_errors_accessor_is_empty_for_other_variants() {
        assert!(ApiError::NotFound.field_errors().is_empty());
        assert_eq!(
            ApiError::ValidationFailed(vec![FieldError::new("a", "b")])
                .field_errors()
                .len(),
            1
        );
    }
}
