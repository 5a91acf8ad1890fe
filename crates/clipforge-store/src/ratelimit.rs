//! Redis-backed `RateLimitRepository`: fixed-window counters via `INCR` +
//! `EXPIREAT`, grounded on
//! `original_source/backend/infrastructure/redis_rate_limit_repository.py`'s
//! `increment` and the whitelist lookup it guards on.

use crate::kv::KvStore;
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use clipforge_core::error::DomainError;
use clipforge_core::ports::{DomainResult, RateLimitRepository};
use clipforge_core::ratelimit::{LimitType, RateLimitState};
use redis::AsyncCommands;

const WHITELIST_KEY: &str = "ratelimit:whitelist";

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

/// Next aligned window boundary for `limit_type`, ported from
/// `_calculate_reset_time`: daily counters reset at next midnight UTC,
/// per-minute and endpoint counters reset at the next minute boundary.
fn calculate_reset_time(limit_type: LimitType, now: DateTime<Utc>) -> DateTime<Utc> {
    match limit_type {
        LimitType::DownloadsPerDay => (now + chrono::Duration::days(1))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc(),
        LimitType::DownloadsPerMinute | LimitType::EndpointPerMinute => {
            let next_minute = now + chrono::Duration::minutes(1);
            next_minute
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap()
        }
    }
}

pub struct RedisRateLimitRepository {
    store: KvStore,
}

impl RedisRateLimitRepository {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Seed the whitelist set (e.g. from `RATE_LIMIT_WHITELIST`) at startup.
    pub async fn seed_whitelist(&self, identifiers: &[String]) -> anyhow::Result<()> {
        if identifiers.is_empty() {
            return Ok(());
        }
        let mut conn = self.store.connection();
        conn.sadd::<_, _, ()>(WHITELIST_KEY, identifiers).await?;
        Ok(())
    }
}

#[async_trait]
impl RateLimitRepository for RedisRateLimitRepository {
    /// Increments `key`'s fixed-window counter and reports the resulting
    /// state. `EXPIREAT` is idempotent, so setting it on every increment is
    /// safe and keeps the key's expiry pinned to the aligned boundary
    /// computed on first increment rather than drifting forward. Any Redis
    /// failure is reported to the caller as a transport error; callers (the
    /// rate-limit manager) are responsible for the fail-open policy — this
    /// port never decides that on their behalf.
    async fn check_and_increment(
        &self,
        key: &str,
        limit_type: LimitType,
        limit: u32,
    ) -> DomainResult<RateLimitState> {
        let reset_at = calculate_reset_time(limit_type, Utc::now());
        let mut conn = self.store.connection();

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire_at(key, reset_at.timestamp())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(transport)?;

        let remaining = (limit as i64 - count).max(0) as u32;

        Ok(RateLimitState {
            limit_type,
            limit,
            remaining,
            reset_at,
        })
    }

    async fn is_whitelisted(&self, identifier: &str) -> DomainResult<bool> {
        let mut conn = self.store.connection();
        conn.sismember(WHITELIST_KEY, identifier)
            .await
            .map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn per_minute_reset_aligns_to_next_minute_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let reset = calculate_reset_time(LimitType::DownloadsPerMinute, now);
        assert_eq!(reset, Utc.with_ymd_and_hms(2024, 3, 1, 12, 31, 0).unwrap());
    }

    #[test]
    fn daily_reset_aligns_to_next_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 1).unwrap();
        let reset = calculate_reset_time(LimitType::DownloadsPerDay, now);
        assert_eq!(reset, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }
}
