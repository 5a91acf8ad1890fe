//! The Job aggregate — spec §3.

use crate::error::ErrorCategory;
use crate::progress::Progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit job identifier, rendered as a 32-char URL-safe hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Job lifecycle status. Transitions are restricted to
/// `pending -> processing -> {completed, failed}`; terminal statuses never
/// transition (spec §3 invariants, Testable Property 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// `Pending -> Failed` is permitted alongside the documented
    /// `Processing -> Failed` edge so that cancelling a job the worker pool
    /// hasn't claimed yet doesn't require waiting for it to start first.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The principal aggregate: a single download request and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub format_id: String,
    pub status: JobStatus,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl Job {
    pub fn new(url: String, format_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            url,
            format_id,
            status: JobStatus::Pending,
            progress: Progress::zero(),
            created_at: now,
            updated_at: now,
            download_url: None,
            download_token: None,
            expire_at: None,
            error_message: None,
            error_category: None,
        }
    }

    /// True once `completed` with its download identifiers attached, or once
    /// `failed` with its error identifiers attached — the two states for
    /// which spec §3's "simultaneously set only on X" invariant is satisfied.
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            JobStatus::Completed => {
                self.download_url.is_some()
                    && self.download_token.is_some()
                    && self.expire_at.is_some()
                    && self.error_message.is_none()
                    && self.error_category.is_none()
            }
            JobStatus::Failed => {
                self.error_message.is_some()
                    && self.download_url.is_none()
                    && self.download_token.is_none()
            }
            JobStatus::Pending | JobStatus::Processing => {
                self.download_url.is_none() && self.error_message.is_none()
            }
        }
    }
}
