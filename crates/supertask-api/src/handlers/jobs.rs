//! Job listing handlers.

use axum::Json;
use axum::extract::{Path, State};

use supertask_core::error::AppError;
use supertask_entity::JobSummary;

use crate::error::ApiError;
use crate::state::ApiState;

/// GET /jobs
pub async fn list_jobs(State(state): State<ApiState>) -> Json<Vec<JobSummary>> {
    let jobs = state
        .scheduler
        .get_jobs()
        .iter()
        .map(JobSummary::from)
        .collect();
    Json(jobs)
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>, ApiError> {
    let record = state
        .scheduler
        .get_job(&id)
        .ok_or_else(|| AppError::not_found(format!("No job by the id of '{id}' was found")))?;
    Ok(Json(JobSummary::from(&record)))
}
