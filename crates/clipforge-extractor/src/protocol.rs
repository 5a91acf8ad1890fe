//! Newline-delimited JSON protocol spoken by the extraction helper process,
//! grounded on `gglib-download::cli_exec::exec::python_protocol`'s
//! line-oriented event parsing.

use clipforge_core::video::{VideoFormat, VideoMeta};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed extractor event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One line of structured output from the extraction helper.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExtractorEvent {
    Probe {
        duration_secs: Option<u64>,
    },
    Resolved {
        meta: VideoMeta,
        formats: Vec<VideoFormat>,
    },
    Progress {
        percentage: u8,
        #[serde(default)]
        speed: Option<String>,
        #[serde(default)]
        eta: Option<String>,
    },
    Done {
        storage_path: String,
        original_filename: String,
        content_type: String,
        size_bytes: u64,
    },
    Error {
        message: String,
    },
}

pub fn parse_line(line: &str) -> Result<ExtractorEvent, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_event() {
        let line = r#"{"event":"progress","percentage":42,"speed":"1.2MB/s"}"#;
        let event = parse_line(line).unwrap();
        assert!(matches!(event, ExtractorEvent::Progress { percentage: 42, .. }));
    }

    #[test]
    fn parses_done_event() {
        let line = r#"{"event":"done","storage_path":"p","original_filename":"f.mp4","content_type":"video/mp4","size_bytes":10}"#;
        let event = parse_line(line).unwrap();
        assert!(matches!(event, ExtractorEvent::Done { .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_line("not json").is_err());
    }
}
