//! Terminal-job snapshot retained after the live record is reaped.

use crate::error::ErrorCategory;
use crate::job::{Job, JobId, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A compact, permanent record of a job's outcome, written by the reaper
/// before the live `Job` hash is evicted (spec §3, component F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobArchive {
    pub id: JobId,
    pub url: String,
    pub format_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl JobArchive {
    pub fn from_job(job: &Job, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: job.id,
            url: job.url.clone(),
            format_id: job.format_id.clone(),
            status: job.status,
            created_at: job.created_at,
            completed_at,
            error_category: job.error_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_terminal_fields_only() {
        let mut job = Job::new("https://example.com".into(), "best".into());
        job.status = JobStatus::Failed;
        job.error_category = Some(ErrorCategory::Timeout);
        let archive = JobArchive::from_job(&job, Utc::now());
        assert_eq!(archive.status, JobStatus::Failed);
        assert_eq!(archive.error_category, Some(ErrorCategory::Timeout));
    }
}
