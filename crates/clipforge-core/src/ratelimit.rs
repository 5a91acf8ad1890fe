//! Rate-limit value types (spec §3 supplement, grounded on
//! `original_source/backend/application/rate_limit_service.py`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The dimension a counter is tracked along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    DownloadsPerMinute,
    DownloadsPerDay,
    EndpointPerMinute,
}

impl LimitType {
    pub fn window_secs(self) -> i64 {
        match self {
            Self::DownloadsPerMinute | Self::EndpointPerMinute => 60,
            Self::DownloadsPerDay => 86_400,
        }
    }
}

/// Coarse classification of requested video length/type, used to pick a
/// concurrent-download allowance in the original rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoType {
    Short,
    Standard,
    Long,
}

impl VideoType {
    /// Classify by duration in seconds, mirroring
    /// `rate_limit_config.py`'s `classify_video_type` thresholds.
    pub fn classify(duration_secs: Option<u64>) -> Self {
        match duration_secs {
            Some(d) if d <= 60 => Self::Short,
            Some(d) if d <= 1800 => Self::Standard,
            Some(_) => Self::Long,
            None => Self::Standard,
        }
    }
}

/// The outcome of checking one counter against its configured limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub limit_type: LimitType,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitState {
    pub fn is_exceeded(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_duration_buckets() {
        assert_eq!(VideoType::classify(Some(30)), VideoType::Short);
        assert_eq!(VideoType::classify(Some(600)), VideoType::Standard);
        assert_eq!(VideoType::classify(Some(7200)), VideoType::Long);
        assert_eq!(VideoType::classify(None), VideoType::Standard);
    }

    #[test]
    fn exceeded_when_remaining_is_zero() {
        let state = RateLimitState {
            limit_type: LimitType::DownloadsPerMinute,
            limit: 5,
            remaining: 0,
            reset_at: Utc::now(),
        };
        assert!(state.is_exceeded());
    }
}
