//! Server configuration from environment variables, grounded on
//! `clipforge_worker::config::WorkerConfig::from_env`.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub redis_url: String,

    pub signed_url_secret: String,
    pub job_ttl_secs: u64,
    pub file_ttl_secs: u64,

    pub rate_limit_enabled: bool,
    pub app_env: String,

    /// Comma-separated list of allowed CORS origins; `*` allows any.
    pub cors_origin: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            redis_url: std::env::var("REDIS_URL").context("REDIS_URL required")?,
            signed_url_secret: std::env::var("SECRET_KEY")
                .context("SECRET_KEY required for signed download URLs")?,
            job_ttl_secs: env_parse("JOB_TTL_SECONDS", 3600)?,
            file_ttl_secs: env_parse("FILE_TTL_SECONDS", 600)?,
            rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            app_env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            cors_origin: std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        })
    }

    /// Open Question 1: rate limiting is enforced only when explicitly
    /// enabled AND the process is running in production, mirroring
    /// `WorkerConfig::should_enforce_rate_limits` — local/dev/test runs are
    /// never impacted by limits tuned for production traffic.
    pub fn should_enforce_rate_limits(&self) -> bool {
        self.rate_limit_enabled && self.app_env == "production"
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v.parse().map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_only_when_enabled_and_production() {
        let mut config = ServerConfig {
            bind_addr: "0.0.0.0:8080".into(),
            redis_url: "redis://localhost".into(),
            signed_url_secret: "s".into(),
            job_ttl_secs: 3600,
            file_ttl_secs: 600,
            rate_limit_enabled: true,
            app_env: "production".into(),
            cors_origin: "*".into(),
        };
        assert!(config.should_enforce_rate_limits());
        config.app_env = "development".into();
        assert!(!config.should_enforce_rate_limits());
    }
}
