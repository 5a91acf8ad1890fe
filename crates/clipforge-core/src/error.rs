//! The categorized-error taxonomy clients branch on (spec §7).

use crate::ratelimit::RateLimitState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A failure category decoupled from the underlying library/extractor message.
///
/// Every `failed` job carries exactly one of these, plus a human-readable
/// message. Clients are expected to branch on the category, never the
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    InvalidUrl,
    VideoUnavailable,
    GeoBlocked,
    LoginRequired,
    FormatNotSupported,
    FormatNotFound,
    FileTooLarge,
    NetworkError,
    PlatformRateLimited,
    RateLimited,
    DownloadFailed,
    Timeout,
    Cancelled,
    SystemError,
}

impl ErrorCategory {
    /// Deterministic category -> HTTP status mapping used by the API boundary.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidUrl | Self::FormatNotFound => 400,
            Self::LoginRequired => 401,
            Self::GeoBlocked => 403,
            Self::VideoUnavailable | Self::FormatNotSupported => 404,
            Self::FileTooLarge => 413,
            Self::RateLimited | Self::PlatformRateLimited => 429,
            Self::Cancelled => 499,
            Self::NetworkError => 502,
            Self::Timeout => 504,
            Self::DownloadFailed | Self::SystemError => 500,
        }
    }

    /// Whether a worker task in this category is eligible for exactly one
    /// automatic retry (Open Question 2: only transient categories retry).
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::PlatformRateLimited)
    }

    /// Categorize a raw extractor failure message by substring match, the
    /// same approach `video_metadata_extractor.py` uses to avoid leaking
    /// library-specific exception text into the job record.
    pub fn classify_extractor_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("private") || lower.contains("unavailable") || lower.contains("removed")
        {
            Self::VideoUnavailable
        } else if lower.contains("geo") || lower.contains("region") || lower.contains("country") {
            Self::GeoBlocked
        } else if lower.contains("login") || lower.contains("sign in") || lower.contains("cookie")
        {
            Self::LoginRequired
        } else if lower.contains("too large") || lower.contains("file size") {
            Self::FileTooLarge
        } else if lower.contains("rate") && lower.contains("limit") {
            Self::PlatformRateLimited
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
        {
            Self::NetworkError
        } else {
            Self::DownloadFailed
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "system-error".to_string());
        write!(f, "{s}")
    }
}

/// Domain-layer failure. The application layer translates these into
/// categorized, user-facing failures at the HTTP/WS boundary.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// The resource existed but is no longer retrievable — an expired
    /// download link past its grace window, distinct from `NotFound` so the
    /// HTTP boundary can return `410 Gone` instead of `404`.
    #[error("gone: {0}")]
    Gone(String),

    #[error("rate limited, resets at {}", state.reset_at)]
    RateLimited { state: RateLimitState },

    #[error("{category}: {message}")]
    Categorized {
        category: ErrorCategory,
        message: String,
        #[source]
        cause: Option<anyhow::Error>,
    },

    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

impl DomainError {
    pub fn categorized(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Categorized {
            category,
            message: message.into(),
            cause: None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Categorized { category, .. } => *category,
            Self::NotFound(_) | Self::InvalidTransition(_) | Self::Validation(_) | Self::Gone(_) => {
                ErrorCategory::SystemError
            }
            Self::Transport(_) => ErrorCategory::SystemError,
        }
    }
}
