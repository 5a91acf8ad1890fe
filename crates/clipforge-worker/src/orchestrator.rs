//! Drives a single job end to end: extract -> download -> store -> register
//! -> complete/fail (spec component L), grounded on
//! `original_source/backend/tasks/download_task.py`.

use crate::file_manager::FileManager;
use crate::job_manager::JobManager;
use clipforge_core::error::{DomainError, ErrorCategory};
use clipforge_core::job::JobId;
use clipforge_core::ports::MetadataExtractor;
use clipforge_core::progress::Progress;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Minimum spacing between forwarded progress events, so a fast extractor
/// can't saturate the fan-out with per-percent updates.
const PROGRESS_THROTTLE: Duration = Duration::from_millis(250);

pub struct DownloadOrchestrator {
    extractor: Arc<dyn MetadataExtractor>,
    jobs: Arc<JobManager>,
    files: Arc<FileManager>,
}

impl DownloadOrchestrator {
    pub fn new(
        extractor: Arc<dyn MetadataExtractor>,
        jobs: Arc<JobManager>,
        files: Arc<FileManager>,
    ) -> Self {
        Self {
            extractor,
            jobs,
            files,
        }
    }

    /// Single-attempt convenience entry point: starts the job, runs one
    /// extract/download/store cycle, and records success or failure. Used
    /// directly by callers that don't need the worker pool's retry policy.
    pub async fn run(&self, job_id: JobId, url: &str, format_id: &str) {
        self.run_with_retry(job_id, url, format_id, 1).await
    }

    /// Starts the job, then retries the extract/download cycle up to
    /// `max_attempts` times as long as each failure is categorized as
    /// transient (Open Question 2: only `network-error` and
    /// `platform-rate-limited` retry). The job is marked `failed` only once
    /// the last eligible attempt is exhausted.
    pub async fn run_with_retry(&self, job_id: JobId, url: &str, format_id: &str, max_attempts: u32) {
        if let Err(err) = self.jobs.start(job_id).await {
            tracing::error!(job_id = %job_id, error = %err, "failed to mark job processing");
            return;
        }

        let max_attempts = max_attempts.max(1);
        let mut last_err = None;
        for attempt_num in 1..=max_attempts {
            match self.attempt(job_id, url, format_id).await {
                Ok(()) => return,
                Err(err) => {
                    let retryable = err.category().is_retryable();
                    tracing::warn!(
                        job_id = %job_id,
                        attempt = attempt_num,
                        retryable,
                        error = %err,
                        "download attempt failed"
                    );
                    let exhausted = !retryable || attempt_num == max_attempts;
                    last_err = Some(err);
                    if exhausted {
                        break;
                    }
                }
            }
        }

        if let Some(err) = last_err {
            let message = err.to_string();
            if let Err(fail_err) = self.jobs.fail(job_id, err.category(), message).await {
                tracing::error!(job_id = %job_id, error = %fail_err, "failed to record job failure");
            }
        }
    }

    /// One extract/download/store/register/complete cycle. Does not touch
    /// job status on entry or on failure — the caller decides whether to
    /// retry or give up.
    ///
    /// `format_id` is only known to be valid for this URL once the extractor
    /// is asked (spec scenario S3: the job exists and transitions through
    /// `processing` before a bad format surfaces as `failed`, never as a
    /// pre-creation rejection).
    async fn attempt(&self, job_id: JobId, url: &str, format_id: &str) -> Result<(), DomainError> {
        let resolution = self.extractor.resolve(url).await?;
        if !resolution.has_format(format_id) {
            return Err(DomainError::categorized(
                ErrorCategory::FormatNotFound,
                format!("format {format_id} is not available for this video"),
            ));
        }

        if let Err(err) = self.extractor.probe_duration(url).await {
            tracing::warn!(job_id = %job_id, error = %err, "probe failed, proceeding to download anyway");
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();
        let publisher = self.jobs.clone();
        let forward_task = tokio::spawn(async move {
            let mut last_forwarded = tokio::time::Instant::now() - PROGRESS_THROTTLE;
            while let Some(progress) = rx.recv().await {
                let now = tokio::time::Instant::now();
                let at_terminal = progress.percentage >= 100;
                if at_terminal || now.duration_since(last_forwarded) >= PROGRESS_THROTTLE {
                    last_forwarded = now;
                    if let Err(err) = publisher.report_progress(job_id, progress).await {
                        tracing::warn!(job_id = %job_id, error = %err, "failed to record progress");
                    }
                }
            }
        });

        let sink = move |progress: Progress| {
            let _ = tx.send(progress);
        };

        let media = self
            .extractor
            .download(url, format_id, job_id, &sink)
            .await;
        drop(sink);
        forward_task.await.ok();
        let media = media?;

        let bytes = tokio::fs::read(&media.storage_path)
            .await
            .map_err(|e| DomainError::Transport(anyhow::Error::new(e)))?;
        let dest_key = format!("{job_id}/{}", media.original_filename);

        let registered = {
            // stash the put behind the file manager's storage handle so the
            // temp-path -> object-key move happens atomically from the
            // caller's perspective.
            self.put_and_register(job_id, &dest_key, bytes, &media).await?
        };

        if let Err(err) = tokio::fs::remove_file(&media.storage_path).await {
            tracing::warn!(job_id = %job_id, path = %media.storage_path, error = %err, "failed to clean up temp download");
        }

        self.jobs
            .complete(
                job_id,
                registered.download_url,
                registered.file.token,
                registered.file.expires_at,
            )
            .await?;
        Ok(())
    }

    async fn put_and_register(
        &self,
        job_id: JobId,
        dest_key: &str,
        bytes: Vec<u8>,
        media: &clipforge_core::ports::ExtractedMedia,
    ) -> Result<crate::file_manager::RegisteredFile, DomainError> {
        self.files.put_blob(dest_key, bytes, &media.content_type).await?;
        self.files
            .register(
                job_id,
                dest_key.to_string(),
                media.original_filename.clone(),
                media.content_type.clone(),
                media.size_bytes,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use clipforge_core::error::ErrorCategory;
    use clipforge_core::file::{DownloadedFile, FileLookup, FileToken};
    use clipforge_core::job::{Job, JobStatus};
    use clipforge_core::ports::{DomainResult, ExtractedMedia, FileRepository, JobRepository, ProgressPublisher, StorageBackend};
    use clipforge_extractor::mock::MockExtractor;
    use clipforge_storage::signed_url::SignedUrlService;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeJobRepo {
        jobs: Mutex<HashMap<JobId, Job>>,
    }

    #[async_trait]
    impl JobRepository for FakeJobRepo {
        async fn insert(&self, job: &Job) -> DomainResult<()> {
            self.jobs.lock().unwrap().insert(job.id, job.clone());
            Ok(())
        }
        async fn get(&self, id: JobId) -> DomainResult<Job> {
            self.jobs.lock().unwrap().get(&id).cloned().ok_or_else(|| DomainError::NotFound(id.to_string()))
        }
        async fn update_status(
            &self,
            id: JobId,
            status: JobStatus,
            error_message: Option<String>,
            error_category: Option<ErrorCategory>,
        ) -> DomainResult<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).unwrap();
            job.status = status;
            job.error_message = error_message;
            job.error_category = error_category;
            Ok(job.clone())
        }
        async fn update_progress(&self, id: JobId, progress: Progress) -> DomainResult<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).unwrap();
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
            let job = jobs.get_mut(&id).unwrap();
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
        async fn list_stale(&self, _older_than: DateTime<Utc>) -> DomainResult<Vec<JobId>> {
            Ok(Vec::new())
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

    #[derive(Default)]
    struct FakeFileRepo {
        by_token: Mutex<HashMap<String, DownloadedFile>>,
    }

    #[async_trait]
    impl FileRepository for FakeFileRepo {
        async fn insert(&self, file: &DownloadedFile) -> DomainResult<()> {
            self.by_token.lock().unwrap().insert(file.token.as_str().to_string(), file.clone());
            Ok(())
        }
        async fn lookup(&self, token: &FileToken) -> DomainResult<FileLookup> {
            Ok(match self.by_token.lock().unwrap().get(token.as_str()) {
                Some(f) => FileLookup::Found(f.clone()),
                None => FileLookup::NotFound,
            })
        }
        async fn get_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>> {
            Ok(self.by_token.lock().unwrap().values().find(|f| f.job_id == job_id.to_string()).cloned())
        }
        async fn delete(&self, token: &FileToken) -> DomainResult<()> {
            self.by_token.lock().unwrap().remove(token.as_str());
            Ok(())
        }
        async fn list_expired(&self, _as_of: DateTime<Utc>) -> DomainResult<Vec<DownloadedFile>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        put_paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageBackend for FakeStorage {
        async fn put(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> DomainResult<()> {
            self.put_paths.lock().unwrap().push(path.to_string());
            Ok(())
        }
        async fn get(&self, _path: &str) -> DomainResult<Vec<u8>> {
            Err(DomainError::NotFound("missing".into()))
        }
        async fn delete(&self, _path: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn exists(&self, _path: &str) -> DomainResult<bool> {
            Ok(false)
        }
    }

    fn file_manager(storage: Arc<FakeStorage>) -> Arc<FileManager> {
        Arc::new(FileManager::new(
            Arc::new(FakeFileRepo::default()),
            storage,
            Arc::new(SignedUrlService::new("secret".into(), "/api/v1/downloads/file".into())),
            600,
        ))
    }

    #[tokio::test]
    async fn successful_download_completes_job_and_registers_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        tokio::fs::write(tmp.path(), b"video bytes").await.unwrap();

        let media = ExtractedMedia {
            storage_path: tmp.path().to_string_lossy().to_string(),
            original_filename: "clip.mp4".into(),
            content_type: "video/mp4".into(),
            size_bytes: 11,
            duration_secs: Some(42),
        };
        let extractor: Arc<dyn MetadataExtractor> = Arc::new(MockExtractor::succeeding(media));
        let job_manager = Arc::new(JobManager::new(Arc::new(FakeJobRepo::default()), Arc::new(NullPublisher)));
        let storage = Arc::new(FakeStorage::default());
        let files = file_manager(storage.clone());

        let orchestrator = DownloadOrchestrator::new(extractor, job_manager.clone(), files);
        let job = job_manager.create("https://x".into(), "137+140".into()).await.unwrap();

        orchestrator.run(job.id, "https://x", "137+140").await;

        let job = job_manager.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.download_url.is_some());
        assert_eq!(storage.put_paths.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_extraction_marks_job_failed_with_category() {
        let extractor: Arc<dyn MetadataExtractor> =
            Arc::new(MockExtractor::failing("Video unavailable: removed by uploader"));
        let job_manager = Arc::new(JobManager::new(Arc::new(FakeJobRepo::default()), Arc::new(NullPublisher)));
        let files = file_manager(Arc::new(FakeStorage::default()));

        let orchestrator = DownloadOrchestrator::new(extractor, job_manager.clone(), files);
        let job = job_manager.create("https://x".into(), "137+140".into()).await.unwrap();

        orchestrator.run(job.id, "https://x", "137+140").await;

        let job = job_manager.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_category, Some(ErrorCategory::VideoUnavailable));
    }

    #[tokio::test]
    async fn unknown_format_id_fails_the_job_instead_of_blocking_creation() {
        let media = ExtractedMedia {
            storage_path: "unused".into(),
            original_filename: "clip.mp4".into(),
            content_type: "video/mp4".into(),
            size_bytes: 1,
            duration_secs: Some(1),
        };
        let extractor: Arc<dyn MetadataExtractor> = Arc::new(MockExtractor::succeeding(media));
        let job_manager = Arc::new(JobManager::new(Arc::new(FakeJobRepo::default()), Arc::new(NullPublisher)));
        let files = file_manager(Arc::new(FakeStorage::default()));

        let orchestrator = DownloadOrchestrator::new(extractor, job_manager.clone(), files);
        let job = job_manager.create("https://x".into(), "nonexistent".into()).await.unwrap();

        orchestrator.run(job.id, "https://x", "nonexistent").await;

        let job = job_manager.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_category, Some(ErrorCategory::FormatNotFound));
    }
}
