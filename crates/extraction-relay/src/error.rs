//! Error types for the extraction relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Relay errors
///
/// Upstream sub-job failures are not errors: the upstream client folds them
/// into a `FAILED` outcome. Only submit-time upstream problems surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or invalid client input
    #[error("{0}")]
    BadRequest(String),

    /// Unknown job, or a job owned by someone else
    #[error("Job not found")]
    NotFound,

    /// Job store error
    #[error("Job store error: {0}")]
    Store(String),

    /// Upstream extraction service rejected a request
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create an upstream error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Upstream(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) | Error::Store(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Store and internal details stay in the logs
        let message = match &self {
            Error::Config(_) | Error::Store(_) | Error::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_hides_ownership() {
        let err = Error::NotFound;
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Job not found");
    }

    #[test]
    fn test_client_errors_are_400() {
        let err = Error::bad_request("Missing job id");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Missing job id");
    }

    #[test]
    fn test_store_error_is_500() {
        assert_eq!(
            Error::store("disk gone").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
