//! API error handling
//!
//! `AppError` is the only type handlers return as an error. Auth failures
//! are mapped to status codes here and nowhere else.

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always false
    pub success: bool,
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::BadRequest(msg) => ApiError::bad_request(msg),
            AppError::Unauthorized(msg) => ApiError::unauthorized(msg),
            AppError::NotFound(resource) => ApiError::not_found(&resource),
            AppError::Conflict(msg) => ApiError::conflict(msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::internal_error()
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ApiError::new("DATABASE_ERROR", "Database operation failed")
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::BadRequest(msg),
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::SessionMismatch => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::InvalidToken(_) => {
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            AuthError::Conflict(_) => AppError::Conflict(err.to_string()),
            AuthError::UserNotFound => AppError::NotFound("User".to_string()),
            AuthError::Store(e) => AppError::Database(e.to_string()),
            AuthError::Signing(_) | AuthError::Password(_) | AuthError::Internal(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
