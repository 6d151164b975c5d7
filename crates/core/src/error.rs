//! Closed error taxonomy shared by every DirtCloud component.
//!
//! A [`DirtError`] always carries one [`ErrorKind`], a human-readable message and
//! an optional bag of named detail fields. The wire shape is
//! `{"error": "NOT_FOUND", "message": "...", "details": {...}}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    ForeignKeyViolation,
    InternalError,
    Unauthorized,
    TooManyRequests,
    ServiceUnavailable,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// HTTP status code the transport answers with for this kind.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::InvalidInput | ErrorKind::ForeignKeyViolation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Detail payload: field name to JSON scalar/array.
pub type Details = BTreeMap<String, Json>;

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct DirtError {
    #[serde(rename = "error")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: Details,
}

pub type DirtResult<T> = Result<T, DirtError>;

impl DirtError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), details: Details::new() }
    }

    /// Attach a named detail field. Later calls with the same key overwrite.
    pub fn with_detail(mut self, key: &str, value: impl Into<Json>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn not_found(resource: &str, identifier: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found", resource))
            .with_detail("resource", resource)
            .with_detail("identifier", identifier)
    }

    pub fn already_exists(resource: &str, field: &str, value: &str) -> Self {
        Self::new(ErrorKind::AlreadyExists, format!("{} with {} '{}' already exists", resource, field, value))
            .with_detail("resource", resource)
            .with_detail("field", field)
            .with_detail("value", value)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn foreign_key_violation(resource: &str, field: &str, value: &str) -> Self {
        Self::new(
            ErrorKind::ForeignKeyViolation,
            format!("referenced {} with {} '{}' does not exist", resource, field, value),
        )
        .with_detail("resource", resource)
        .with_detail("field", field)
        .with_detail("value", value)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRequests, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn detail(&self, key: &str) -> Option<&Json> { self.details.get(key) }

    pub fn is_not_found(&self) -> bool { self.kind == ErrorKind::NotFound }
    pub fn is_already_exists(&self) -> bool { self.kind == ErrorKind::AlreadyExists }
    pub fn is_invalid_input(&self) -> bool { self.kind == ErrorKind::InvalidInput }
    pub fn is_foreign_key_violation(&self) -> bool { self.kind == ErrorKind::ForeignKeyViolation }
    pub fn is_internal(&self) -> bool { self.kind == ErrorKind::InternalError }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_one_to_one() {
        let cases = [
            (ErrorKind::NotFound, 404),
            (ErrorKind::AlreadyExists, 409),
            (ErrorKind::InvalidInput, 400),
            (ErrorKind::ForeignKeyViolation, 400),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::TooManyRequests, 429),
            (ErrorKind::ServiceUnavailable, 503),
            (ErrorKind::InternalError, 500),
        ];
        for (kind, status) in cases {
            assert_eq!(kind.http_status(), status, "{kind}");
        }
    }

    #[test]
    fn wire_shape_uses_codes_and_omits_empty_details() {
        let e = DirtError::internal("boom");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, serde_json::json!({ "error": "INTERNAL_ERROR", "message": "boom" }));

        let e = DirtError::not_found("project", "p-1");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["error"], "NOT_FOUND");
        assert_eq!(v["details"]["resource"], "project");
        assert_eq!(v["details"]["identifier"], "p-1");
    }

    #[test]
    fn classification_helpers() {
        let fk = DirtError::foreign_key_violation("project", "id", "nope");
        assert!(fk.is_foreign_key_violation());
        assert!(!fk.is_not_found());
        assert_eq!(fk.detail("resource"), Some(&Json::from("project")));
        assert!(DirtError::already_exists("project", "name", "a").is_already_exists());
        assert_eq!(DirtError::unauthorized("x").to_string(), "UNAUTHORIZED: x");
    }

    #[test]
    fn deserializes_back_from_wire() {
        let raw = r#"{"error":"FOREIGN_KEY_VIOLATION","message":"m","details":{"resource":"project"}}"#;
        let e: DirtError = serde_json::from_str(raw).unwrap();
        assert_eq!(e.kind(), ErrorKind::ForeignKeyViolation);
        assert_eq!(e.details.len(), 1);
    }
}
