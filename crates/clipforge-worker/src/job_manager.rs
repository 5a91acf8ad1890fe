//! Job lifecycle operations: the seam between the HTTP/WS boundary (or the
//! worker pool) and the `JobRepository` + `ProgressPublisher` ports.

use crate::file_manager::FileManager;
use chrono::{DateTime, Utc};
use clipforge_core::archive::JobArchive;
use clipforge_core::error::{DomainError, ErrorCategory};
use clipforge_core::file::FileToken;
use clipforge_core::job::{Job, JobId, JobStatus};
use clipforge_core::ports::{ArchiveRepository, DomainResult, JobRepository, ProgressPublisher};
use clipforge_core::progress::Progress;
use std::sync::Arc;

pub struct JobManager {
    jobs: Arc<dyn JobRepository>,
    progress: Arc<dyn ProgressPublisher>,
}

/// Outcome of one archival-pipeline pass. Each count only advances past a
/// stage whose write actually succeeded, per spec.md's "partial progress is
/// strictly better than none" rationale.
#[derive(Debug, Default, Clone)]
pub struct ArchivalSummary {
    pub archived: u64,
    pub files_deleted: u64,
    pub jobs_deleted: u64,
    pub warnings: Vec<String>,
}

impl JobManager {
    pub fn new(jobs: Arc<dyn JobRepository>, progress: Arc<dyn ProgressPublisher>) -> Self {
        Self { jobs, progress }
    }

    /// The archival pipeline: for every job stale as of `threshold`, archive
    /// it (if configured), delete its bound file (if a file manager is
    /// supplied), then delete the job record. Each stage is independently
    /// tolerant — a failure at one stage is logged and the pipeline still
    /// attempts the next stage for that job, and moves on to the next job
    /// regardless (spec §4.7).
    pub async fn cleanup_expired(
        &self,
        threshold: DateTime<Utc>,
        archive: Option<&Arc<dyn ArchiveRepository>>,
        files: Option<&Arc<FileManager>>,
    ) -> DomainResult<ArchivalSummary> {
        let mut summary = ArchivalSummary::default();
        let stale_ids = self.jobs.list_stale(threshold).await?;

        for id in stale_ids {
            let job = match self.jobs.get(id).await {
                Ok(job) => job,
                Err(DomainError::NotFound(_)) => continue,
                Err(err) => {
                    summary.warnings.push(format!("{id}: fetch failed: {err}"));
                    continue;
                }
            };

            if let Some(archive_repo) = archive {
                if job.status.is_terminal() {
                    let snapshot = JobArchive::from_job(&job, Utc::now());
                    match archive_repo.archive(&snapshot).await {
                        Ok(()) => summary.archived += 1,
                        Err(err) => summary.warnings.push(format!("{id}: archive failed: {err}")),
                    }
                }
            }

            if let Some(file_manager) = files {
                match file_manager.get_by_job_id(id).await {
                    Ok(Some(file)) => match file_manager.delete(&file.token, false).await {
                        Ok(()) => summary.files_deleted += 1,
                        Err(err) => summary.warnings.push(format!("{id}: file delete failed: {err}")),
                    },
                    Ok(None) => {}
                    Err(err) => summary.warnings.push(format!("{id}: file lookup failed: {err}")),
                }
            }

            match self.jobs.delete(id).await {
                Ok(()) => summary.jobs_deleted += 1,
                Err(err) => summary.warnings.push(format!("{id}: job delete failed: {err}")),
            }
        }

        Ok(summary)
    }

    pub async fn create(&self, url: String, format_id: String) -> DomainResult<Job> {
        let job = Job::new(url, format_id);
        self.jobs.insert(&job).await?;
        Ok(job)
    }

    pub async fn get(&self, id: JobId) -> DomainResult<Job> {
        self.jobs.get(id).await
    }

    pub async fn start(&self, id: JobId) -> DomainResult<Job> {
        let job = self
            .jobs
            .update_status(id, JobStatus::Processing, None, None)
            .await?;
        self.progress
            .publish_status(id, JobStatus::Processing, None)
            .await?;
        Ok(job)
    }

    pub async fn report_progress(&self, id: JobId, progress: Progress) -> DomainResult<Job> {
        let job = self.jobs.update_progress(id, progress.clone()).await?;
        self.progress.publish(id, &progress).await?;
        Ok(job)
    }

    pub async fn complete(
        &self,
        id: JobId,
        download_url: String,
        download_token: FileToken,
        expire_at: DateTime<Utc>,
    ) -> DomainResult<Job> {
        let job = self
            .jobs
            .complete(id, download_url, download_token, expire_at)
            .await?;
        self.progress
            .publish_status(id, JobStatus::Completed, None)
            .await?;
        Ok(job)
    }

    pub async fn fail(&self, id: JobId, category: ErrorCategory, message: String) -> DomainResult<Job> {
        let job = self
            .jobs
            .update_status(id, JobStatus::Failed, Some(message), Some(category))
            .await?;
        self.progress
            .publish_status(id, JobStatus::Failed, Some(category))
            .await?;
        Ok(job)
    }

    pub async fn cancel(&self, id: JobId) -> DomainResult<Job> {
        let job = self.jobs.get(id).await?;
        if job.status.is_terminal() {
            return Err(DomainError::InvalidTransition(format!(
                "job {id} is already {}",
                job.status
            )));
        }
        self.fail(id, ErrorCategory::Cancelled, "cancelled by client".to_string())
            .await
    }

    pub async fn delete(&self, id: JobId) -> DomainResult<()> {
        self.jobs.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clipforge_core::job::JobStatus;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeJobRepo {
        jobs: Mutex<std::collections::HashMap<JobId, Job>>,
    }

    #[async_trait]
    impl JobRepository for FakeJobRepo {
        async fn insert(&self, job: &Job) -> DomainResult<()> {
            self.jobs.lock().unwrap().insert(job.id, job.clone());
            Ok(())
        }

        async fn get(&self, id: JobId) -> DomainResult<Job> {
            self.jobs
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| DomainError::NotFound(id.to_string()))
        }

        async fn update_status(
            &self,
            id: JobId,
            status: JobStatus,
            error_message: Option<String>,
            error_category: Option<ErrorCategory>,
        ) -> DomainResult<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).ok_or_else(|| DomainError::NotFound(id.to_string()))?;
            if !job.status.can_transition_to(status) {
                return Err(DomainError::InvalidTransition(format!("{} -> {status}", job.status)));
            }
            job.status = status;
            job.error_message = error_message;
            job.error_category = error_category;
            Ok(job.clone())
        }

        async fn update_progress(&self, id: JobId, progress: Progress) -> DomainResult<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).ok_or_else(|| DomainError::NotFound(id.to_string()))?;
            job.progress = progress;
            Ok(job.clone())
        }

        async fn complete(
            &self,
            id: JobId,
            download_url: String,
            download_token: FileToken,
            expire_at: DateTime<Utc>,
        ) -> DomainResult<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).ok_or_else(|| DomainError::NotFound(id.to_string()))?;
            job.status = JobStatus::Completed;
            job.download_url = Some(download_url);
            job.download_token = Some(download_token.to_string());
            job.expire_at = Some(expire_at);
            Ok(job.clone())
        }

        async fn delete(&self, id: JobId) -> DomainResult<()> {
            self.jobs.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn list_stale(&self, older_than: DateTime<Utc>) -> DomainResult<Vec<JobId>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.updated_at < older_than)
                .map(|j| j.id)
                .collect())
        }
    }

    struct NullPublisher;

    #[async_trait]
    impl ProgressPublisher for NullPublisher {
        async fn publish(&self, _job_id: JobId, _progress: &Progress) -> DomainResult<()> {
            Ok(())
        }
        async fn publish_status(
            &self,
            _job_id: JobId,
            _status: JobStatus,
            _error_category: Option<ErrorCategory>,
        ) -> DomainResult<()> {
            Ok(())
        }
    }

    fn manager() -> JobManager {
        JobManager::new(Arc::new(FakeJobRepo::default()), Arc::new(NullPublisher))
    }

    #[tokio::test]
    async fn create_then_start_then_complete() {
        let manager = manager();
        let job = manager.create("https://x".into(), "best".into()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let job = manager.start(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        let job = manager
            .complete(
                job.id,
                "https://dl/x".into(),
                FileToken::generate(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_on_terminal_job_is_rejected() {
        let manager = manager();
        let job = manager.create("https://x".into(), "best".into()).await.unwrap();
        manager.start(job.id).await.unwrap();
        manager
            .fail(job.id, ErrorCategory::Timeout, "timed out".into())
            .await
            .unwrap();

        let err = manager.cancel(job.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[derive(Default)]
    struct FakeArchiveRepo {
        archived: Mutex<Vec<JobId>>,
    }

    #[async_trait]
    impl ArchiveRepository for FakeArchiveRepo {
        async fn archive(&self, archive: &JobArchive) -> DomainResult<()> {
            self.archived.lock().unwrap().push(archive.id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn cleanup_expired_archives_and_deletes_stale_terminal_jobs() {
        let jobs_repo = Arc::new(FakeJobRepo::default());
        let manager = JobManager::new(jobs_repo.clone(), Arc::new(NullPublisher));

        let job = manager.create("https://x".into(), "best".into()).await.unwrap();
        manager.start(job.id).await.unwrap();
        manager
            .fail(job.id, ErrorCategory::Timeout, "timed out".into())
            .await
            .unwrap();
        // backdate so it's picked up as stale.
        jobs_repo.jobs.lock().unwrap().get_mut(&job.id).unwrap().updated_at =
            Utc::now() - chrono::Duration::hours(2);

        let archive_repo: Arc<dyn ArchiveRepository> = Arc::new(FakeArchiveRepo::default());
        let summary = manager
            .cleanup_expired(Utc::now() - chrono::Duration::hours(1), Some(&archive_repo), None)
            .await
            .unwrap();

        assert_eq!(summary.archived, 1);
        assert_eq!(summary.jobs_deleted, 1);
        assert!(manager.get(job.id).await.is_err());
    }
}
