//! Periodic cleanup task (spec component O): a ticking background sweep.
//! Runs three independent sweeps in order — expired jobs, expired files,
//! orphaned temp files on disk — plus a queue-orphan reclaim sweep specific
//! to this system's Redis-backed durable queue.

use crate::file_manager::FileManager;
use crate::job_manager::JobManager;
use crate::metrics::WorkerMetrics;
use chrono::{Duration as ChronoDuration, Utc};
use clipforge_core::ports::ArchiveRepository;
use clipforge_store::queue::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Stray files older than this in the extractor's output directory are
/// presumed abandoned by a worker that crashed mid-download.
const ORPHAN_TEMP_FILE_AGE: Duration = Duration::from_secs(3600);

pub struct ReaperConfig {
    pub interval: Duration,
    pub job_ttl: ChronoDuration,
    pub orphan_queue_claim_age: Duration,
    pub download_dir: String,
}

#[derive(Debug, Default, Clone)]
pub struct ReaperSummary {
    pub jobs_archived: u64,
    pub jobs_deleted: u64,
    pub files_expired: u64,
    pub orphan_temp_files_deleted: u64,
    pub queue_entries_reclaimed: u64,
    pub warnings: Vec<String>,
}

pub struct Reaper {
    jobs: Arc<JobManager>,
    files: Arc<FileManager>,
    archive: Option<Arc<dyn ArchiveRepository>>,
    queue: Arc<JobQueue>,
    metrics: WorkerMetrics,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(
        jobs: Arc<JobManager>,
        files: Arc<FileManager>,
        archive: Option<Arc<dyn ArchiveRepository>>,
        queue: Arc<JobQueue>,
        metrics: WorkerMetrics,
        config: ReaperConfig,
    ) -> Self {
        Self {
            jobs,
            files,
            archive,
            queue,
            metrics,
            config,
        }
    }

    /// Spawns the periodic tick loop as a background task.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            loop {
                interval.tick().await;
                let summary = self.run_once().await;
                if summary.warnings.is_empty() {
                    info!(
                        jobs_archived = summary.jobs_archived,
                        jobs_deleted = summary.jobs_deleted,
                        files_expired = summary.files_expired,
                        orphan_temp_files_deleted = summary.orphan_temp_files_deleted,
                        queue_entries_reclaimed = summary.queue_entries_reclaimed,
                        "reaper tick complete"
                    );
                } else {
                    for warning in &summary.warnings {
                        warn!(warning, "reaper sweep warning");
                    }
                    info!(
                        jobs_archived = summary.jobs_archived,
                        jobs_deleted = summary.jobs_deleted,
                        files_expired = summary.files_expired,
                        orphan_temp_files_deleted = summary.orphan_temp_files_deleted,
                        queue_entries_reclaimed = summary.queue_entries_reclaimed,
                        warning_count = summary.warnings.len(),
                        "reaper tick complete with warnings"
                    );
                }
            }
        })
    }

    /// Runs all sweeps once. Each sweep's failure is folded into the summary
    /// rather than aborting the others — one bad record never stalls the
    /// rest of a tick.
    pub async fn run_once(&self) -> ReaperSummary {
        let mut summary = ReaperSummary::default();
        let now = Utc::now();

        match self
            .jobs
            .cleanup_expired(now - self.config.job_ttl, self.archive.as_ref(), Some(&self.files))
            .await
        {
            Ok(archival) => {
                summary.jobs_archived = archival.archived;
                summary.jobs_deleted = archival.jobs_deleted;
                summary.warnings.extend(archival.warnings);
            }
            Err(err) => summary.warnings.push(format!("job sweep failed: {err}")),
        }

        match self.files.cleanup_expired(now).await {
            Ok(count) => {
                summary.files_expired = count;
                self.metrics.reaper_files_expired.inc_by(count);
            }
            Err(err) => summary.warnings.push(format!("file sweep failed: {err}")),
        }

        match sweep_orphaned_temp_files(&self.config.download_dir, ORPHAN_TEMP_FILE_AGE).await {
            Ok(count) => summary.orphan_temp_files_deleted = count,
            Err(err) => summary.warnings.push(format!("orphan temp file sweep failed: {err}")),
        }

        match self.reclaim_orphaned_queue_entries().await {
            Ok(count) => {
                summary.queue_entries_reclaimed = count;
                self.metrics.reaper_requeued.inc_by(count);
            }
            Err(err) => summary.warnings.push(format!("queue orphan sweep failed: {err}")),
        }

        summary
    }

    async fn reclaim_orphaned_queue_entries(&self) -> anyhow::Result<u64> {
        let orphaned = self.queue.list_orphaned(self.config.orphan_queue_claim_age).await?;
        let mut reclaimed = 0u64;
        for job_id in orphaned {
            match self.queue.requeue(job_id).await {
                Ok(()) => reclaimed += 1,
                Err(err) => warn!(job_id = %job_id, error = %err, "failed to requeue orphaned job"),
            }
        }
        Ok(reclaimed)
    }
}

/// Best-effort scan of the extractor's scratch directory for files a
/// crashed worker never cleaned up.
async fn sweep_orphaned_temp_files(download_dir: &str, max_age: Duration) -> std::io::Result<u64> {
    let mut entries = match tokio::fs::read_dir(download_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut deleted = 0u64;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .unwrap_or_default();
        if age > max_age {
            if tokio::fs::remove_file(entry.path()).await.is_ok() {
                deleted += 1;
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweep_ignores_missing_directory() {
        let deleted = sweep_orphaned_temp_files("/nonexistent/clipforge-dir", ORPHAN_TEMP_FILE_AGE)
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn sweep_deletes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.part");
        let fresh_path = dir.path().join("fresh.part");
        tokio::fs::write(&old_path, b"x").await.unwrap();
        tokio::fs::write(&fresh_path, b"x").await.unwrap();

        // Backdate the "old" file's mtime well past the cutoff.
        let old_time = std::time::SystemTime::now() - Duration::from_secs(7200);
        filetime::set_file_mtime(&old_path, filetime::FileTime::from_system_time(old_time)).unwrap();

        let deleted = sweep_orphaned_temp_files(dir.path().to_str().unwrap(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(!old_path.exists());
        assert!(fresh_path.exists());
    }
}
