//! Downloaded-file records and the opaque token used to fetch them.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, URL-safe bearer token identifying a downloaded artifact.
///
/// Generated from 32 bytes of OS randomness, hex-encoded (64 chars) — long
/// enough that guessing is infeasible, matching the original's token scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileToken(String);

impl FileToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FileToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A completed, downloadable artifact produced by a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub token: FileToken,
    pub job_id: String,
    pub storage_path: String,
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DownloadedFile {
    /// Files remain fetchable for a grace window past `expires_at` so that an
    /// in-flight download isn't severed mid-transfer (spec §3 edge cases).
    pub const GRACE_PERIOD_SECS: i64 = 60;

    pub fn grace_deadline(&self) -> DateTime<Utc> {
        self.expires_at + chrono::Duration::seconds(Self::GRACE_PERIOD_SECS)
    }
}

/// Result of resolving a token against the file repository.
#[derive(Debug, Clone)]
pub enum FileLookup {
    Found(DownloadedFile),
    Expired,
    NotFound,
}
