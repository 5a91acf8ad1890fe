//! `MetadataExtractor` backed by an external helper process, grounded on
//! `gglib-download::cli_exec::exec::python_bridge::run_download_process`:
//! spawn, stream stdout line-by-line, dispatch structured events.

use crate::protocol::{parse_line, ExtractorEvent};
use async_trait::async_trait;
use clipforge_core::error::{DomainError, ErrorCategory};
use clipforge_core::job::JobId;
use clipforge_core::ports::{DomainResult, ExtractedMedia, MetadataExtractor, ProgressSink};
use clipforge_core::progress::Progress;
use clipforge_core::video::VideoResolution;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::warn;

/// Path to the extraction helper binary, and the directory downloads land in
/// before being handed to the storage backend.
pub struct ProcessExtractor {
    helper_path: String,
    output_dir: String,
}

impl ProcessExtractor {
    pub fn new(helper_path: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            helper_path: helper_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("EXTRACTOR_HELPER_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            std::env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "/tmp/clipforge-downloads".into()),
        )
    }
}

fn categorize_process_failure(stderr: &str) -> DomainError {
    DomainError::categorized(ErrorCategory::classify_extractor_message(stderr), stderr)
}

#[async_trait]
impl MetadataExtractor for ProcessExtractor {
    async fn probe_duration(&self, url: &str) -> DomainResult<Option<u64>> {
        let output = Command::new(&self.helper_path)
            .arg("--probe")
            .arg(url)
            .output()
            .await
            .map_err(|e| DomainError::Transport(anyhow::Error::new(e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(categorize_process_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if let Ok(ExtractorEvent::Probe { duration_secs }) = parse_line(line) {
                return Ok(duration_secs);
            }
        }
        Ok(None)
    }

    async fn resolve(&self, url: &str) -> DomainResult<VideoResolution> {
        let output = Command::new(&self.helper_path)
            .arg("--resolve")
            .arg(url)
            .output()
            .await
            .map_err(|e| DomainError::Transport(anyhow::Error::new(e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(categorize_process_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if let Ok(ExtractorEvent::Resolved { meta, formats }) = parse_line(line) {
                return Ok(VideoResolution { meta, formats });
            }
        }
        Err(DomainError::categorized(
            ErrorCategory::DownloadFailed,
            "extractor exited successfully without reporting a resolution",
        ))
    }

    async fn download(
        &self,
        url: &str,
        format_id: &str,
        job_id: JobId,
        on_progress: ProgressSink<'_>,
    ) -> DomainResult<ExtractedMedia> {
        let mut cmd = Command::new(&self.helper_path);
        cmd.arg("--download")
            .arg(url)
            .arg("--format")
            .arg(format_id)
            .arg("--job-id")
            .arg(job_id.to_string())
            .arg("--dest")
            .arg(&self.output_dir)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| DomainError::Transport(anyhow::Error::new(e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::categorized(ErrorCategory::SystemError, "missing stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DomainError::categorized(ErrorCategory::SystemError, "missing stderr"))?;

        let mut lines = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr);
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_reader.read_to_end(&mut buf).await;
            buf
        });

        let mut outcome: Option<ExtractedMedia> = None;
        let mut failure: Option<String> = None;

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| DomainError::Transport(anyhow::Error::new(e)))?;
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(ExtractorEvent::Progress {
                    percentage,
                    speed,
                    eta,
                }) => {
                    on_progress(Progress::downloading(percentage, speed, eta));
                }
                Ok(ExtractorEvent::Done {
                    storage_path,
                    original_filename,
                    content_type,
                    size_bytes,
                }) => {
                    outcome = Some(ExtractedMedia {
                        storage_path,
                        original_filename,
                        content_type,
                        size_bytes,
                        duration_secs: None,
                    });
                }
                Ok(ExtractorEvent::Error { message }) => {
                    failure = Some(message);
                }
                Ok(ExtractorEvent::Probe { .. }) | Ok(ExtractorEvent::Resolved { .. }) => {}
                Err(e) => warn!(error = %e, line, "unparseable extractor output line"),
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DomainError::Transport(anyhow::Error::new(e)))?;
        let stderr_buf = stderr_task.await.unwrap_or_default();
        let stderr_text = String::from_utf8_lossy(&stderr_buf).trim().to_string();

        if let Some(message) = failure {
            return Err(categorize_process_failure(&message));
        }

        if !status.success() {
            let reason = if stderr_text.is_empty() {
                format!("extractor exited with status {status}")
            } else {
                stderr_text
            };
            return Err(categorize_process_failure(&reason));
        }

        outcome.ok_or_else(|| {
            DomainError::categorized(
                ErrorCategory::DownloadFailed,
                "extractor exited successfully without reporting a result",
            )
        })
    }
}
