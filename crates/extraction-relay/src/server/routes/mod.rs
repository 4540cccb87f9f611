//! API routes for the relay server

pub mod status;

use axum::{http::HeaderMap, routing::get, Router};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/extraction/status", get(status::missing_job_id))
        .route("/extraction/status/", get(status::missing_job_id))
        .route("/extraction/status/:job_id", get(status::get_job_status))
        .route("/extraction/jobs", get(status::list_jobs))
}

/// Query parameters that may carry the caller's identity
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Resolve the caller's user id
///
/// Precedence: `user-id` header, `user_id` query parameter, `x-user-id`
/// header. Blank values are skipped.
pub fn resolve_user_id(headers: &HeaderMap, query: &UserQuery) -> Result<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    header("user-id")
        .or_else(|| {
            query
                .user_id
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .or_else(|| header("x-user-id"))
        .ok_or_else(|| Error::bad_request("Missing user id"))
}
