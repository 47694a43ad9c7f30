//! Job handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState};
use tally_core::models::{Job, JobSummary, Receipt};
use tally_core::view::ReceiptView;

/// Request body for creating or renaming a job
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub name: String,
}

/// Query parameters for job list
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Case-insensitive name filter
    pub search: Option<String>,
}

/// GET /api/jobs - List jobs with receipt counts and totals
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobListQuery>,
) -> Result<Json<Vec<JobSummary>>, AppError> {
    let jobs = state.db.list_jobs()?;
    let view = ReceiptView {
        job_id: None,
        search: params.search,
    };
    Ok(Json(view.filter_jobs(&jobs)))
}

/// POST /api/jobs - Create a job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobRequest>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let job = state.db.create_job(&req.name)?;
    info!(job_id = job.id, "Created job '{}'", job.name);
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs/:id - Get a specific job
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .db
        .get_job(id)?
        .ok_or_else(|| AppError::not_found("Job not found"))?;
    Ok(Json(job))
}

/// PUT /api/jobs/:id - Rename a job
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<JobRequest>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .db
        .update_job(id, &req.name)?
        .ok_or_else(|| AppError::not_found("Job not found"))?;
    Ok(Json(job))
}

/// Response for job deletion
#[derive(Debug, Serialize)]
pub struct DeleteJobResponse {
    pub message: String,
    pub job: Job,
    pub receipts_deleted: usize,
}

/// DELETE /api/jobs/:id - Delete a job with its receipts, items and files
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteJobResponse>, AppError> {
    let deleted = state
        .db
        .delete_job(id)?
        .ok_or_else(|| AppError::not_found("Job not found"))?;

    for path in &deleted.file_paths {
        state.release_file(path);
    }

    Ok(Json(DeleteJobResponse {
        message: format!(
            "Deleted job '{}' and {} receipt(s)",
            deleted.job.name, deleted.receipts_deleted
        ),
        job: deleted.job,
        receipts_deleted: deleted.receipts_deleted,
    }))
}

/// GET /api/jobs/:id/receipts - Receipts attributed to a job
pub async fn list_job_receipts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Receipt>>, AppError> {
    state
        .db
        .get_job(id)?
        .ok_or_else(|| AppError::not_found("Job not found"))?;

    Ok(Json(state.db.list_receipts_for_job(id)?))
}
