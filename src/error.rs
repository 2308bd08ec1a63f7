use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::lifecycle::InvalidTransition};

/// Failures of the matchmaking and lifecycle services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The store failed or returned a record that cannot be decoded.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No store is installed.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The request names something unknown or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The match is not in a status that allows the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The match does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Rejected(message) => ServiceError::InvalidState(message),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Errors returned by HTTP handlers, rendered as `{code, message}` JSON bodies.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rendered as 400.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Rendered as 404.
    #[error("not found: {0}")]
    NotFound(String),
    /// Rendered as 409.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The store is down; clients may retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.parts();
        let body = Json(ErrorBody {
            code,
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}
