//! Job status and history endpoints

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};

use super::{resolve_user_id, UserQuery};
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::store::JobStore;
use crate::types::{JobHistoryResponse, JobStatusResponse};

/// GET /api/extraction/status/:job_id - Poll one job
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> Result<Json<JobStatusResponse>> {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return Err(Error::bad_request("Missing job id"));
    }
    let user_id = resolve_user_id(&headers, &query)?;

    tracing::info!("[{}] Status poll by {}", job_id, user_id);

    let record = state.reconciler().poll(job_id, &user_id).await?;
    Ok(Json(JobStatusResponse::from_record(&record)))
}

/// GET /api/extraction/status - Poll without a job id
pub async fn missing_job_id() -> Result<Json<JobStatusResponse>> {
    Err(Error::bad_request("Missing job id"))
}

/// GET /api/extraction/jobs - The caller's jobs, newest first
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> Result<Json<JobHistoryResponse>> {
    let user_id = resolve_user_id(&headers, &query)?;
    let records = state.store().list_for_user(&user_id).await?;
    Ok(Json(JobHistoryResponse::from_records(&records)))
}
