//! In-memory `MetadataExtractor` for tests and local development without an
//! external helper binary installed.

use async_trait::async_trait;
use clipforge_core::error::DomainError;
use clipforge_core::job::JobId;
use clipforge_core::ports::{DomainResult, ExtractedMedia, MetadataExtractor, ProgressSink};
use clipforge_core::progress::Progress;
use clipforge_core::video::{VideoFormat, VideoMeta, VideoResolution};
use std::sync::Mutex;

pub struct MockExtractor {
    pub duration_secs: Option<u64>,
    pub resolution: Option<VideoResolution>,
    pub result: Mutex<Option<Result<ExtractedMedia, String>>>,
}

impl MockExtractor {
    pub fn succeeding(media: ExtractedMedia) -> Self {
        Self {
            duration_secs: media.duration_secs,
            resolution: Some(default_resolution()),
            result: Mutex::new(Some(Ok(media))),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            duration_secs: None,
            resolution: Some(default_resolution()),
            result: Mutex::new(Some(Err(message.into()))),
        }
    }

    pub fn with_resolution(mut self, resolution: VideoResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// A single `137+140`-style format, matching the scenario fixtures in
/// spec §8's test scripts.
fn default_resolution() -> VideoResolution {
    VideoResolution {
        meta: VideoMeta {
            id: "abc123".into(),
            title: "Mock Video".into(),
            uploader: "Mock Uploader".into(),
            duration_secs: Some(300),
            thumbnail: None,
        },
        formats: vec![VideoFormat {
            format_id: "137+140".into(),
            extension: "mp4".into(),
            resolution: Some("1920x1080".into()),
            height: Some(1080),
            width: Some(1920),
            filesize_bytes: Some(10_000_000),
            video_codec: "avc1".into(),
            audio_codec: "mp4a".into(),
            format_note: Some("1080p".into()),
        }],
    }
}

#[async_trait]
impl MetadataExtractor for MockExtractor {
    async fn probe_duration(&self, _url: &str) -> DomainResult<Option<u64>> {
        Ok(self.duration_secs)
    }

    async fn resolve(&self, _url: &str) -> DomainResult<VideoResolution> {
        self.resolution.clone().ok_or_else(|| {
            DomainError::categorized(
                clipforge_core::error::ErrorCategory::SystemError,
                "mock extractor has no configured resolution",
            )
        })
    }

    async fn download(
        &self,
        _url: &str,
        _format_id: &str,
        _job_id: JobId,
        on_progress: ProgressSink<'_>,
    ) -> DomainResult<ExtractedMedia> {
        on_progress(Progress::downloading(50, None, None));
        on_progress(Progress::downloading(100, None, None));

        match self.result.lock().unwrap().take() {
            Some(Ok(media)) => Ok(media),
            Some(Err(message)) => Err(DomainError::categorized(
                clipforge_core::error::ErrorCategory::classify_extractor_message(&message),
                message,
            )),
            None => Err(DomainError::categorized(
                clipforge_core::error::ErrorCategory::SystemError,
                "mock extractor exhausted",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeding_mock_reports_progress_then_result() {
        let media = ExtractedMedia {
            storage_path: "p".into(),
            original_filename: "f.mp4".into(),
            content_type: "video/mp4".into(),
            size_bytes: 10,
            duration_secs: Some(30),
        };
        let extractor = MockExtractor::succeeding(media);
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |p: Progress| seen.lock().unwrap().push(p.percentage);
        let result = extractor
            .download("https://x", "best", JobId::new(), &sink)
            .await
            .unwrap();
        assert_eq!(result.size_bytes, 10);
        assert_eq!(seen.into_inner().unwrap(), vec![50, 100]);
    }

    #[tokio::test]
    async fn failing_mock_categorizes_message() {
        let extractor = MockExtractor::failing("Video unavailable: private video");
        let sink = |_: Progress| {};
        let err = extractor
            .download("https://x", "best", JobId::new(), &sink)
            .await
            .unwrap_err();
        assert_eq!(
            err.category(),
            clipforge_core::error::ErrorCategory::VideoUnavailable
        );
    }
}
