//! Error types for lgu-rs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The actor is not the party this action belongs to.
    #[error("{0}")]
    ForbiddenRole(String),

    /// The actor has not completed the required identity verification.
    #[error("Verification required: {0}")]
    VerificationRequired(String),

    /// The actor's home municipality differs from the item's.
    #[error("Location mismatch: {0}")]
    LocationMismatch(String),

    /// The transaction is not in a status that allows the action.
    #[error("{0}")]
    InvalidTransition(String),

    #[error("Item not available: {0}")]
    ItemNotAvailable(String),

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    #[error("Cannot transact on your own item")]
    SelfTransactionForbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_)
            | Self::ForbiddenRole(_)
            | Self::VerificationRequired(_)
            | Self::LocationMismatch(_) => StatusCode::FORBIDDEN,
            Self::InvalidTransition(_)
            | Self::ItemNotAvailable(_)
            | Self::DuplicateRequest(_)
            | Self::SelfTransactionForbidden
            | Self::BadRequest(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::Database(_) | Self::Storage(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::ForbiddenRole(_) => "FORBIDDEN_ROLE",
            Self::VerificationRequired(_) => "VERIFICATION_REQUIRED",
            Self::LocationMismatch(_) => "LOCATION_MISMATCH",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::ItemNotAvailable(_) => "ITEM_NOT_AVAILABLE",
            Self::DuplicateRequest(_) => "DUPLICATE_REQUEST",
            Self::SelfTransactionForbidden => "SELF_TRANSACTION_FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_errors_map_to_expected_status() {
        assert_eq!(
            AppError::ForbiddenRole("Only the seller can perform this action".into())
                .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InvalidTransition("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DuplicateRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::LocationMismatch("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_codes_are_distinct_for_guard_failures() {
        assert_eq!(AppError::ForbiddenRole(String::new()).error_code(), "FORBIDDEN_ROLE");
        assert_eq!(
            AppError::SelfTransactionForbidden.error_code(),
            "SELF_TRANSACTION_FORBIDDEN"
        );
        assert_eq!(
            AppError::ItemNotAvailable(String::new()).error_code(),
            "ITEM_NOT_AVAILABLE"
        );
    }

    #[test]
    fn test_server_errors() {
        assert!(AppError::Database("boom".into()).is_server_error());
        assert!(AppError::Storage("disk full".into()).is_server_error());
        assert!(!AppError::NotFound("tx".into()).is_server_error());
    }
}
