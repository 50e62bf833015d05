/// Error types for Engagement Service
///
/// Errors are converted to appropriate HTTP responses for API clients.
/// Uniqueness-constraint conflicts on likes and view events never reach this
/// type: the repositories reinterpret them as the idempotent
/// "already in that state" outcome before any error is raised.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for engagement-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed content/user identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Malformed request payload
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid identity on a call that requires one
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable store failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache tier failure (swallowed on the hot path, surfaced only from
    /// cache-only operations)
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidIdentifier(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_msg,
            "status": status.as_u16(),
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes_match_taxonomy() {
        assert_eq!(
            AppError::InvalidIdentifier("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::NotFound("media".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_is_json_with_status() {
        let resp = AppError::NotFound("content not found".into()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
