// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

use super::validation::ValidationResult;

/// Message returned whenever the real cause must stay internal.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Something went wrong. If the issue persists, please contact our support team.";

/// Message for any credential failure. Identical for "no such user" and
/// "wrong password" so the response cannot be used to probe registered emails.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Incorrect email or password";

/// Message for any link-token failure. Never says which check failed.
pub const TOKEN_INVALID_MESSAGE: &str = "Link has expired or is invalid. Please try again.";

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    NotFound(String),
    ValidationError(String),
    Credential,
    Conflict(String),
    TokenInvalid,
    Infrastructure(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::Credential => write!(f, "Credential Error"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::TokenInvalid => write!(f, "Token Invalid"),
            ApiError::Infrastructure(msg) => write!(f, "Infrastructure Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR"),
            ApiError::Credential => (
                StatusCode::BAD_REQUEST,
                INVALID_CREDENTIALS_MESSAGE.to_string(),
                "INVALID_CREDENTIALS",
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT"),
            ApiError::TokenInvalid => (
                StatusCode::BAD_REQUEST,
                TOKEN_INVALID_MESSAGE.to_string(),
                "TOKEN_INVALID",
            ),
            ApiError::Infrastructure(msg) => {
                // full cause is logged, the caller only sees the generic message
                error!(cause = %msg, "Infrastructure error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    GENERIC_ERROR_MESSAGE.to_string(),
                    "INTERNAL_SERVER_ERROR",
                )
            }
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    GENERIC_ERROR_MESSAGE.to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Helper function to convert ValidationResult to ApiError
impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            ApiError::Infrastructure(
                "Validation result was valid but converted to error".to_string(),
            )
        } else {
            let error_messages: Vec<String> = result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            ApiError::ValidationError(error_messages.join(", "))
        }
    }
}
