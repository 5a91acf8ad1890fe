//! Multi-limit check orchestration, whitelist, and most-restrictive header
//! selection (spec component J), grounded on
//! `original_source/backend/application/rate_limit_service.py` and the
//! graceful-degradation policy in
//! `original_source/backend/infrastructure/redis_rate_limit_repository.py`'s
//! `_create_unlimited_entity`.

use chrono::Utc;
use clipforge_core::error::DomainError;
use clipforge_core::ports::{DomainResult, RateLimitRepository};
use clipforge_core::ratelimit::{LimitType, RateLimitState, VideoType};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub per_minute_burst: u32,
    pub per_category_daily: HashMap<VideoType, u32>,
    pub total_daily: u32,
    /// `"path:limit"` pairs parsed from `ENDPOINT_RATE_LIMITS`.
    pub endpoint_hourly: HashMap<String, u32>,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let per_minute_burst = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let total_daily = std::env::var("RATE_LIMIT_DAILY_TOTAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);
        let short = std::env::var("RATE_LIMIT_DAILY_SHORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let standard = std::env::var("RATE_LIMIT_DAILY_STANDARD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let long = std::env::var("RATE_LIMIT_DAILY_LONG")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let mut per_category_daily = HashMap::new();
        per_category_daily.insert(VideoType::Short, short);
        per_category_daily.insert(VideoType::Standard, standard);
        per_category_daily.insert(VideoType::Long, long);

        let endpoint_hourly = std::env::var("ENDPOINT_RATE_LIMITS")
            .ok()
            .map(|raw| parse_endpoint_map(&raw))
            .unwrap_or_default();

        Self {
            per_minute_burst,
            per_category_daily,
            total_daily,
            endpoint_hourly,
        }
    }
}

fn parse_endpoint_map(raw: &str) -> HashMap<String, u32> {
    raw.split(',')
        .filter_map(|pair| {
            let (path, limit) = pair.split_once(':')?;
            limit.trim().parse().ok().map(|l| (path.trim().to_string(), l))
        })
        .collect()
}

pub struct RateLimitManager {
    repo: Arc<dyn RateLimitRepository>,
    config: RateLimitConfig,
}

impl RateLimitManager {
    pub fn new(repo: Arc<dyn RateLimitRepository>, config: RateLimitConfig) -> Self {
        Self { repo, config }
    }

    /// Checks, in order, per-minute burst, per-category daily, then total
    /// daily. Each check increments; the first exceeded limit short-circuits
    /// with a `RateLimited` error carrying the exceeded state.
    pub async fn check_download_limits(
        &self,
        ip_hash: &str,
        video_type: VideoType,
    ) -> DomainResult<Vec<RateLimitState>> {
        if self.checked_whitelisted(ip_hash).await {
            return Ok(Vec::new());
        }

        let mut states = Vec::new();

        let per_minute = self
            .checked_increment(ip_hash, LimitType::DownloadsPerMinute, self.config.per_minute_burst)
            .await;
        reject_if_exceeded(&per_minute)?;
        states.push(per_minute);

        let category_cap = *self
            .config
            .per_category_daily
            .get(&video_type)
            .unwrap_or(&self.config.total_daily);
        let category_key = format!("{ip_hash}:{video_type:?}");
        let per_category = self
            .checked_increment(&category_key, LimitType::DownloadsPerDay, category_cap)
            .await;
        reject_if_exceeded(&per_category)?;
        states.push(per_category);

        let total = self
            .checked_increment(ip_hash, LimitType::DownloadsPerDay, self.config.total_daily)
            .await;
        reject_if_exceeded(&total)?;
        states.push(total);

        Ok(states)
    }

    /// Only applies when `endpoint` is present in the configured hourly map.
    pub async fn check_endpoint_limit(
        &self,
        ip_hash: &str,
        endpoint: &str,
    ) -> DomainResult<Option<RateLimitState>> {
        let Some(&limit) = self.config.endpoint_hourly.get(endpoint) else {
            return Ok(None);
        };
        if self.checked_whitelisted(ip_hash).await {
            return Ok(None);
        }
        let key = format!("{ip_hash}:{endpoint}");
        let state = self
            .checked_increment(&key, LimitType::EndpointPerMinute, limit)
            .await;
        reject_if_exceeded(&state)?;
        Ok(Some(state))
    }

    /// Of a set of applicable limit states, the one to base response headers
    /// on — whichever has the least remaining headroom.
    pub fn most_restrictive(states: &[RateLimitState]) -> Option<&RateLimitState> {
        states.iter().min_by_key(|s| s.remaining)
    }

    /// Graceful degradation: a store transport failure never blocks a
    /// download, it returns a fresh unlimited state instead, mirroring
    /// `_create_unlimited_entity` in the original Redis repository.
    async fn checked_increment(&self, key: &str, limit_type: LimitType, limit: u32) -> RateLimitState {
        match self.repo.check_and_increment(key, limit_type, limit).await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(key, limit = limit, error = %err, "rate limit store unavailable, failing open");
                unlimited_state(limit_type, limit)
            }
        }
    }

    async fn checked_whitelisted(&self, ip_hash: &str) -> bool {
        match self.repo.is_whitelisted(ip_hash).await {
            Ok(whitelisted) => whitelisted,
            Err(err) => {
                tracing::error!(ip_hash, error = %err, "rate limit store unavailable, skipping whitelist check");
                false
            }
        }
    }
}

fn unlimited_state(limit_type: LimitType, limit: u32) -> RateLimitState {
    RateLimitState {
        limit_type,
        limit,
        remaining: limit,
        reset_at: Utc::now() + chrono::Duration::seconds(limit_type.window_secs()),
    }
}

fn reject_if_exceeded(state: &RateLimitState) -> DomainResult<()> {
    if state.is_exceeded() {
        return Err(DomainError::RateLimited { state: state.clone() });
    }
    Ok(())
}
