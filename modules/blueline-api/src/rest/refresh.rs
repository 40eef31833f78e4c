use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use blueline_common::RefreshSummary;
use blueline_engine::jobs::start_refresh_job;

use crate::error::ApiError;
use crate::views::JobView;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub region: String,
}

/// POST /api/refresh — blocking refresh, returns the aggregate counts.
pub async fn refresh_sync(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshSummary>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let summary = state.engine.refresh(&request.region).await?;
    Ok(Json(summary))
}

/// POST /api/refresh-async — create the job and return immediately.
/// A region with no active sources surfaces on the job, not here.
pub async fn refresh_async(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let job = start_refresh_job(state.engine.clone(), &request.region).await?;

    Ok(Json(serde_json::json!({
        "job_id": job.job_id,
        "region": job.region,
        "status": job.status.to_string(),
        "message": "Refresh started; poll /api/refresh-status/{job_id}",
    })))
}

/// GET /api/refresh-status/{job_id} — poll an async job.
pub async fn refresh_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    // Job ids are opaque; anything that doesn't parse simply isn't a job.
    let job_id =
        Uuid::parse_str(&job_id).map_err(|_| ApiError::NotFound("Job not found".to_string()))?;
    let job = state.jobs.get(job_id).await?;
    Ok(Json(JobView::from(&job)))
}
