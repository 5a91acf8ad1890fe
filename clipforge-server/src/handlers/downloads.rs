//! `POST /downloads` — validates the request and rate limits, then enqueues a
//! job for the worker pool to claim. An unknown `format_id` is NOT rejected
//! here: spec §8 scenario S3 requires the job to be created and transition to
//! `failed` with `error_category: "format-not-found"` once the orchestrator
//! attempts it, rather than a pre-creation 400.

use super::videos::validate_url;
use crate::dto::{CreateDownloadRequest, CreateDownloadResponse};
use crate::error::ApiResult;
use crate::rate_limit;
use crate::state::SharedState;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;
use clipforge_core::error::DomainError;
use clipforge_core::ratelimit::VideoType;
use std::net::SocketAddr;

pub async fn create(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CreateDownloadRequest>,
) -> ApiResult<(StatusCode, Json<CreateDownloadResponse>)> {
    validate_url(&req.url)?;

    let resolution = state.extractor.resolve(&req.url).await?;
    let video_type = VideoType::classify(resolution.meta.duration_secs);
    rate_limit::check_download_limits(&state, addr, video_type).await?;

    let job = state.jobs.create(req.url, req.format_id).await?;
    state
        .queue
        .push(job.id)
        .await
        .map_err(DomainError::Transport)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateDownloadResponse {
            job_id: job.id.to_string(),
            status: job.status,
        }),
    ))
}
