//! `GET /jobs/{id}` and `DELETE /jobs/{id}`.

use crate::dto::{parse_job_id, JobResponse};
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn get(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<JobResponse>> {
    let id = parse_job_id(&id)?;
    let job = state.jobs.get(id).await?;
    Ok(Json(job.into()))
}

/// Cancellation of an already-terminal job is rejected by `JobManager::cancel`
/// with `DomainError::InvalidTransition`, which `ApiError` maps to `409`.
pub async fn cancel(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_job_id(&id)?;
    state.jobs.cancel(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
