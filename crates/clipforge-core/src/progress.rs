//! Job progress value type.

use serde::{Deserialize, Serialize};

/// A point-in-time progress reading for an in-flight download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// 0-100.
    pub percentage: u8,
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
}

impl Progress {
    pub fn zero() -> Self {
        Self {
            percentage: 0,
            phase: "queued".to_string(),
            speed: None,
            eta: None,
        }
    }

    pub fn downloading(percentage: u8, speed: Option<String>, eta: Option<String>) -> Self {
        Self {
            percentage: percentage.min(100),
            phase: "downloading".to_string(),
            speed,
            eta,
        }
    }

    /// Whether `next` is a legal successor to `self` under the
    /// monotonically-non-decreasing-percentage invariant (spec §3, Testable
    /// Property 4).
    pub fn is_monotonic_successor(&self, next: &Progress) -> bool {
        next.percentage >= self.percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_starts_at_zero_percent() {
        assert_eq!(Progress::zero().percentage, 0);
    }

    #[test]
    fn downloading_clamps_to_100() {
        assert_eq!(Progress::downloading(150, None, None).percentage, 100);
    }

    #[test]
    fn monotonic_successor_rejects_decrease() {
        let p1 = Progress::downloading(50, None, None);
        let p2 = Progress::downloading(30, None, None);
        assert!(!p1.is_monotonic_successor(&p2));
        assert!(p1.is_monotonic_successor(&Progress::downloading(50, None, None)));
        assert!(p1.is_monotonic_successor(&Progress::downloading(90, None, None)));
    }
}
