//! Capability ports. Infrastructure crates (`clipforge-store`,
//! `clipforge-storage`, `clipforge-extractor`) implement these traits;
//! `clipforge-worker` and `clipforge-server` depend only on the traits.

use crate::archive::JobArchive;
use crate::error::{DomainError, ErrorCategory};
use crate::file::{DownloadedFile, FileLookup, FileToken};
use crate::job::{Job, JobId, JobStatus};
use crate::progress::Progress;
use crate::ratelimit::{LimitType, RateLimitState};
use crate::video::VideoResolution;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type DomainResult<T> = Result<T, DomainError>;

/// Persists and mutates `Job` aggregates. Implementations are expected to
/// enforce the status state machine atomically (spec §3, Testable
/// Property 1) rather than leaving that guard to callers.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: &Job) -> DomainResult<()>;
    async fn get(&self, id: JobId) -> DomainResult<Job>;
    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<String>,
        error_category: Option<ErrorCategory>,
    ) -> DomainResult<Job>;
    async fn update_progress(&self, id: JobId, progress: Progress) -> DomainResult<Job>;
    async fn complete(
        &self,
        id: JobId,
        download_url: String,
        download_token: FileToken,
        expire_at: DateTime<Utc>,
    ) -> DomainResult<Job>;
    async fn delete(&self, id: JobId) -> DomainResult<()>;
    /// Ids of jobs whose `updated_at` is older than `older_than`, regardless
    /// of status — used by the reaper's stale-job sweep.
    async fn list_stale(&self, older_than: DateTime<Utc>) -> DomainResult<Vec<JobId>>;
}

/// Persists `DownloadedFile` records and resolves bearer tokens.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, file: &DownloadedFile) -> DomainResult<()>;
    async fn lookup(&self, token: &FileToken) -> DomainResult<FileLookup>;
    async fn get_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>>;
    async fn delete(&self, token: &FileToken) -> DomainResult<()>;
    async fn list_expired(&self, as_of: DateTime<Utc>) -> DomainResult<Vec<DownloadedFile>>;
}

/// Sliding/fixed-window counters behind the rate-limit manager. Failures from
/// this port must never block a request (spec §3: fail-open on repository
/// errors).
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    async fn check_and_increment(
        &self,
        key: &str,
        limit_type: LimitType,
        limit: u32,
    ) -> DomainResult<RateLimitState>;
    async fn is_whitelisted(&self, identifier: &str) -> DomainResult<bool>;
}

/// Archives terminal jobs after the reaper evicts their live record.
#[async_trait]
pub trait ArchiveRepository: Send + Sync {
    async fn archive(&self, archive: &JobArchive) -> DomainResult<()>;
}

/// Durable object storage for completed artifacts (local filesystem or a
/// cloud bucket — spec component D).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> DomainResult<()>;
    async fn get(&self, path: &str) -> DomainResult<Vec<u8>>;
    async fn delete(&self, path: &str) -> DomainResult<()>;
    async fn exists(&self, path: &str) -> DomainResult<bool>;
}

/// Outcome of a single download attempt, reported by a `MetadataExtractor`.
#[derive(Debug, Clone)]
pub struct ExtractedMedia {
    pub storage_path: String,
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub duration_secs: Option<u64>,
}

/// A progress callback handed to the extractor so it can stream updates
/// while a single long-running download is in flight.
pub type ProgressSink<'a> = &'a (dyn Fn(Progress) + Send + Sync);

/// Resolves metadata for a URL and performs the actual download. Backed by a
/// process-exec bridge to an external extraction tool in production, and by
/// an in-memory fake in tests.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn probe_duration(&self, url: &str) -> DomainResult<Option<u64>>;

    /// Resolves a source URL's metadata and every format it can be
    /// downloaded as, for `POST /videos/resolutions` and for validating a
    /// download request's `format_id` before a job is created.
    async fn resolve(&self, url: &str) -> DomainResult<VideoResolution>;

    async fn download(
        &self,
        url: &str,
        format_id: &str,
        job_id: JobId,
        on_progress: ProgressSink<'_>,
    ) -> DomainResult<ExtractedMedia>;
}

/// Publishes progress/status events for fan-out to WebSocket subscribers
/// (spec component N).
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish(&self, job_id: JobId, progress: &Progress) -> DomainResult<()>;
    async fn publish_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error_category: Option<ErrorCategory>,
    ) -> DomainResult<()>;
}
