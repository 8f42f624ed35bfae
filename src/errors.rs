use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::ffi;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong!";

static CONSTRAINT_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"constraint failed: (?:\w+\.)?(\w+)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),
    #[error("INVALID_ID: {field}={value}")]
    InvalidId { field: &'static str, value: String },
    #[error("DUPLICATE: {0}")]
    Duplicate(String),
    #[error("CONSTRAINT: {}", .0.join(". "))]
    Constraint(Vec<String>),
    #[error("AUTH_INVALID_TOKEN")]
    InvalidToken,
    #[error("AUTH_TOKEN_EXPIRED")]
    TokenExpired,
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("MALFORMED_BODY: {0}")]
    MalformedBody(String),
    #[error("PAYLOAD_TOO_LARGE")]
    PayloadTooLarge,
    #[error("STORAGE: {0}")]
    Storage(#[source] rusqlite::Error),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn task_not_found() -> Self {
        Self::NotFound("Task not found".to_string())
    }

    /// Maps every failure onto the single caller-facing shape.
    ///
    /// Non-operational variants never expose their own text.
    pub fn normalize(&self) -> NormalizedError {
        let (status, message, violations) = match self {
            Self::Validation(violations) => (
                StatusCode::BAD_REQUEST,
                format!("Validation failed: {}", join_violations(violations)),
                violations.clone(),
            ),
            Self::InvalidId { field, value } => (
                StatusCode::BAD_REQUEST,
                format!("Invalid {field}: {value}."),
                vec![FieldViolation::new(*field, "Invalid task ID")],
            ),
            Self::Duplicate(field) => (
                StatusCode::BAD_REQUEST,
                format!("Duplicate field value: {field}. Please use another value!"),
                Vec::new(),
            ),
            Self::Constraint(reasons) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid input data. {}", reasons.join(". ")),
                Vec::new(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid token. Please log in again!".to_string(),
                Vec::new(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "Your token has expired! Please log in again.".to_string(),
                Vec::new(),
            ),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.clone(), Vec::new()),
            Self::MalformedBody(reason) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON payload: {reason}"),
                Vec::new(),
            ),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body exceeds the configured size limit".to_string(),
                Vec::new(),
            ),
            Self::Storage(_) | Self::Io(_) | Self::Internal(_) => {
                return NormalizedError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    kind: ErrorKind::Error,
                    message: GENERIC_FAILURE_MESSAGE.to_string(),
                    operational: false,
                    violations: Vec::new(),
                    detail: format!("{self:?}"),
                };
            }
        };

        NormalizedError {
            status,
            kind: ErrorKind::for_status(status),
            message,
            operational: true,
            violations,
            detail: format!("{self:?}"),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        let constraint = match &value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Some((err.extended_code, message.clone().unwrap_or_default()))
            }
            _ => None,
        };

        let Some((extended_code, message)) = constraint else {
            return Self::Storage(value);
        };
        let target = CONSTRAINT_TARGET
            .captures(&message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "record".to_string());

        match extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => Self::Duplicate(target),
            ffi::SQLITE_CONSTRAINT_NOTNULL => Self::Constraint(vec![format!("Path `{target}` is required")]),
            _ => Self::Constraint(vec![format!("Path `{target}` violates a store constraint")]),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Fail,
    Error,
}

impl ErrorKind {
    fn for_status(status: StatusCode) -> Self {
        if status.is_client_error() {
            Self::Fail
        } else {
            Self::Error
        }
    }
}

/// Caller-facing failure. `detail` is only rendered outside production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
    pub operational: bool,
    pub violations: Vec<FieldViolation>,
    pub detail: String,
}

impl NormalizedError {
    pub fn envelope(&self, include_detail: bool) -> serde_json::Value {
        let mut body = json!({
            "status": self.kind,
            "message": self.message,
        });
        if !self.violations.is_empty() {
            body["errors"] = json!(self.violations);
        }
        if include_detail {
            body["detail"] = json!(self.detail);
        }
        body
    }

    pub fn into_response_with_detail(self, include_detail: bool) -> Response {
        let body = Json(self.envelope(include_detail));
        let mut response = (self.status, body).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.normalize().into_response_with_detail(false)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| violation.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
