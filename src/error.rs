//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Postgres SQLSTATE codes the member store cares about.
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("storage: {0}")]
    Storage(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("lock wait timed out, retry the request")]
    LockTimeout,
}

impl AppError {
    /// Database errors that carry a meaning for callers are reclassified; everything else stays opaque.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Db(e) => match sqlstate(e).as_deref() {
                Some(PG_LOCK_NOT_AVAILABLE) => (StatusCode::SERVICE_UNAVAILABLE, "lock_timeout"),
                Some(PG_UNIQUE_VIOLATION) | Some(PG_EXCLUSION_VIOLATION) => {
                    (StatusCode::BAD_REQUEST, "conflict")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            },
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::Conflict(_) => (StatusCode::BAD_REQUEST, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::LockTimeout => (StatusCode::SERVICE_UNAVAILABLE, "lock_timeout"),
        }
    }

    /// True when the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        self.classify().1 == "lock_timeout"
    }
}

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned())
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = match (&self, code) {
            (AppError::Db(_), "lock_timeout") => AppError::LockTimeout.to_string(),
            (AppError::Db(_), "conflict") => "conflict: rank already taken".to_string(),
            (AppError::Db(_) | AppError::Storage(_), _) => {
                tracing::error!(error = %self, "storage failure");
                "storage error".to_string()
            }
            (AppError::Config(_), _) => {
                tracing::error!(error = %self, "configuration failure");
                "configuration error".to_string()
            }
            _ => self.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
