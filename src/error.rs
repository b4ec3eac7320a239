//! # Error Handling
//!
//! Error types for the HTTP surface and their conversion to JSON responses.
//!
//! Only the HTTP endpoints use these types. Call-relay failures never travel
//! through them: the relay tasks report tagged outcomes (`relay::TaskOutcome`)
//! and the supervisor pattern-matches those, because the call protocol has no
//! error-reply channel.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Errors that can be returned to HTTP clients.
#[derive(Debug)]
pub enum AppError {
    /// Server-side failures (500)
    Internal(String),

    /// Client sent invalid or malformed data (400)
    BadRequest(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

/// Converts an `AppError` into the JSON error body every endpoint shares.
///
/// ## Response format:
/// ```json
/// {
///   "error": {
///     "type": "bad_request",
///     "message": "Invalid JSON body: ...",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Shorthand for handler results carrying our error type.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = AppError::BadRequest("missing field".to_string());
        let response = err.error_response();
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn display_includes_message() {
        let err = AppError::Internal("disk full".to_string());
        assert_eq!(err.to_string(), "Internal error: disk full");
    }
}
