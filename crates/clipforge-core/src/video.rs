//! Video metadata and format-listing value types (spec §6's `POST
//! /videos/resolutions`), grounded on
//! `original_source/backend/domain/video_processing/entities.py`'s
//! `VideoMetadata`/`VideoFormat`.

use serde::{Deserialize, Serialize};

/// Descriptive metadata about a source video, independent of any particular
/// encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_secs: Option<u64>,
    pub thumbnail: Option<String>,
}

/// One downloadable encoding of a video, as reported by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub extension: String,
    pub resolution: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub filesize_bytes: Option<u64>,
    pub video_codec: String,
    pub audio_codec: String,
    pub format_note: Option<String>,
}

/// The result of resolving a source URL: its metadata plus every format the
/// extractor can produce from it, sorted by height descending to match
/// `extract_formats`'s ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResolution {
    pub meta: VideoMeta,
    pub formats: Vec<VideoFormat>,
}

impl VideoResolution {
    pub fn has_format(&self, format_id: &str) -> bool {
        self.formats.iter().any(|f| f.format_id == format_id)
    }
}
