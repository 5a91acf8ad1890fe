//! Worker configuration from environment variables.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub redis_url: String,
    pub metrics_port: u16,

    /// Concurrent job slots this worker process runs.
    pub concurrency: usize,
    /// How long `claim()` blocks waiting for work before looping to check
    /// for shutdown.
    pub poll_interval_secs: u64,
    /// Soft per-job timeout: the orchestrator logs and still lets the
    /// extractor finish.
    pub soft_timeout_secs: u64,
    /// Hard per-job timeout: the orchestrator kills the extractor and fails
    /// the job as `timeout`.
    pub hard_timeout_secs: u64,

    pub reaper_interval_secs: u64,
    /// A job whose `inflight` claim is older than this is presumed orphaned
    /// by a dead worker and is requeued.
    pub orphan_timeout_secs: u64,
    /// A job whose `updated_at` is older than this with no activity is
    /// force-failed by the reaper regardless of claim state.
    pub stale_job_timeout_secs: u64,

    pub signed_url_secret: String,
    pub job_ttl_secs: u64,
    pub file_ttl_secs: u64,

    pub rate_limit_enabled: bool,
    pub app_env: String,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            worker_id: std::env::var("WORKER_ID")
                .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string()),
            redis_url: std::env::var("REDIS_URL").context("REDIS_URL required")?,
            metrics_port: env_parse("METRICS_PORT", 9090)?,
            concurrency: env_parse("WORKER_CONCURRENCY", 4)?,
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", 5)?,
            soft_timeout_secs: env_parse("SOFT_TIMEOUT_SECS", 300)?,
            hard_timeout_secs: env_parse("HARD_TIMEOUT_SECS", 900)?,
            reaper_interval_secs: env_parse("REAPER_INTERVAL_SECS", 60)?,
            orphan_timeout_secs: env_parse("ORPHAN_TIMEOUT_SECS", 600)?,
            stale_job_timeout_secs: env_parse("STALE_JOB_TIMEOUT_SECS", 3600)?,
            signed_url_secret: std::env::var("SECRET_KEY")
                .context("SECRET_KEY required for signed download URLs")?,
            job_ttl_secs: env_parse("JOB_TTL_SECONDS", 3600)?,
            file_ttl_secs: env_parse("FILE_TTL_SECONDS", 600)?,
            rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            app_env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Open Question 1: rate limiting is enforced only when explicitly
    /// enabled AND the process is running in production, so local/dev/test
    /// runs are never impacted by limits tuned for production traffic.
    pub fn should_enforce_rate_limits(&self) -> bool {
        self.rate_limit_enabled && self.app_env == "production"
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_only_when_enabled_and_production() {
        let mut config = WorkerConfig {
            worker_id: "w".into(),
            redis_url: "redis://localhost".into(),
            metrics_port: 9090,
            concurrency: 4,
            poll_interval_secs: 5,
            soft_timeout_secs: 300,
            hard_timeout_secs: 900,
            reaper_interval_secs: 60,
            orphan_timeout_secs: 600,
            stale_job_timeout_secs: 3600,
            signed_url_secret: "s".into(),
            job_ttl_secs: 3600,
            file_ttl_secs: 600,
            rate_limit_enabled: true,
            app_env: "production".into(),
        };
        assert!(config.should_enforce_rate_limits());

        config.app_env = "development".into();
        assert!(!config.should_enforce_rate_limits());

        config.app_env = "production".into();
        config.rate_limit_enabled = false;
        assert!(!config.should_enforce_rate_limits());
    }
}
