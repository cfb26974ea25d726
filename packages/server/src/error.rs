use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use common::{ContentStatus, InvalidTransition};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

/// One field-level problem in a rejected request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldIssue {
    /// Name of the offending field.
    #[schema(example = "password")]
    pub field: String,
    #[schema(example = "Password must be 8-128 characters")]
    pub message: String,
}

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `INVALID_TOKEN`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `PERMISSION_DENIED`,
    /// `NOT_FOUND`, `CONFLICT`, `EMAIL_TAKEN`, `INVALID_TRANSITION`, `RATE_LIMITED`,
    /// `SERVICE_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Request validation failed")]
    pub error: String,
    /// Per-field issues for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldIssue>>,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// Several field-level validation failures.
    InvalidInput(Vec<FieldIssue>),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    /// Password-reset or verification token unknown, expired, or consumed.
    InvalidToken,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    EmailTaken,
    InvalidTransition {
        from: ContentStatus,
        to: ContentStatus,
    },
    /// Rate limit exceeded. Contains seconds until retry is allowed.
    RateLimited {
        retry_after: u64,
    },
    ServiceUnavailable(String),
    Internal(String),
}

impl AppError {
    fn body(code: &'static str, error: impl Into<String>) -> ErrorBody {
        ErrorBody {
            success: false,
            code,
            error: error.into(),
            details: None,
        }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Self::body("VALIDATION_ERROR", msg))
            }
            AppError::InvalidInput(issues) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    details: Some(issues),
                    ..Self::body("VALIDATION_ERROR", "Request validation failed")
                },
            ),
            AppError::InvalidToken => (
                StatusCode::BAD_REQUEST,
                Self::body("INVALID_TOKEN", "Token is invalid or has expired"),
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                Self::body("TOKEN_MISSING", "Authentication required"),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                Self::body("TOKEN_INVALID", "Invalid or expired token"),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Self::body("INVALID_CREDENTIALS", "Invalid email or password"),
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                Self::body("PERMISSION_DENIED", "Insufficient permissions"),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Self::body("NOT_FOUND", msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, Self::body("CONFLICT", msg)),
            AppError::EmailTaken => (
                StatusCode::CONFLICT,
                Self::body("EMAIL_TAKEN", "Email is already registered"),
            ),
            AppError::InvalidTransition { from, to } if from == to => (
                StatusCode::CONFLICT,
                Self::body(
                    "INVALID_TRANSITION",
                    format!("Content in status {from} can no longer be changed"),
                ),
            ),
            AppError::InvalidTransition { from, to } => (
                StatusCode::CONFLICT,
                Self::body(
                    "INVALID_TRANSITION",
                    format!("Cannot move content from {from} to {to}"),
                ),
            ),
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                Self::body(
                    "RATE_LIMITED",
                    format!("Rate limit exceeded. Try again in {} seconds", retry_after),
                ),
            ),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Self::body("SERVICE_UNAVAILABLE", msg),
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Self::body("INTERNAL_ERROR", "An unexpected error occurred"),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = if let AppError::RateLimited { retry_after } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let (status, body) = self.status_and_body();

        if let Some(seconds) = retry_after {
            (status, [("Retry-After", seconds.to_string())], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Map a failed insert that references the caller's account. A foreign key
/// violation there means the account was deleted while its access token is
/// still signed.
pub fn map_actor_fk(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::TokenInvalid,
        _ => AppError::from(err),
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::InvalidTransition {
            from: err.from,
            to: err.to,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                tracing::warn!("Stored object missing: {key}");
                AppError::NotFound("File not found".into())
            }
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::Config(msg) => AppError::ServiceUnavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
