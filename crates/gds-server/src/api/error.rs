//! API error types and responses
//!
//! The registration surface exposes the directory's error taxonomy
//! directly: `INVALID_ARGUMENT` for caller mistakes (surfaced verbatim),
//! `NOT_FOUND`, `ALREADY_EXISTS`, `FAILED_PRECONDITION` when a state
//! machine gate is violated, `ABORTED` for transient failures the caller
//! should retry whole, and `INTERNAL` for bugs and infrastructure faults.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::secrets::SecretsError;
use crate::storage::StorageError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Aborted(String),

    #[error("{0}")]
    Internal(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Set on ABORTED replies: retry the whole request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retry) = match &self {
            ApiError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::AlreadyExists(_) => (StatusCode::CONFLICT, "ALREADY_EXISTS", None),
            ApiError::FailedPrecondition(_) => {
                (StatusCode::PRECONDITION_FAILED, "FAILED_PRECONDITION", None)
            }
            ApiError::Aborted(_) => (StatusCode::CONFLICT, "ABORTED", Some(true)),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", None),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            retry,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ApiError::NotFound(format!("record not found: {id}")),
            StorageError::AlreadyExists(key) => {
                ApiError::AlreadyExists(format!("record already exists: {key}"))
            }
            StorageError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<SecretsError> for ApiError {
    fn from(err: SecretsError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
