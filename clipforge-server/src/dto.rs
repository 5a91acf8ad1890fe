//! Request/response wire shapes for the REST surface (spec §6).

use clipforge_core::error::ErrorCategory;
use clipforge_core::job::{Job, JobId, JobStatus};
use clipforge_core::progress::Progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDownloadRequest {
    pub url: String,
    pub format_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateDownloadResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.to_string(),
            status: job.status,
            progress: job.progress,
            download_url: job.download_url,
            expire_at: job.expire_at,
            error: job.error_message,
            error_category: job.error_category,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub redis: bool,
    pub queue_depth: Option<u64>,
}

pub fn parse_job_id(raw: &str) -> Result<JobId, clipforge_core::error::DomainError> {
    raw.parse()
        .map_err(|_| clipforge_core::error::DomainError::Validation(format!("invalid job id: {raw}")))
}
