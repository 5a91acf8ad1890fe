//! Rate-limit middleware: emits `X-RateLimit-*` response headers and turns
//! an exceeded limit into a `429` before the request reaches its handler,
//! grounded on `clipforge_worker::rate_limit_manager::RateLimitManager`.

use crate::error::ApiError;
use crate::state::SharedState;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use clipforge_core::error::DomainError;
use clipforge_core::ratelimit::VideoType;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

fn hash_ip(addr: &SocketAddr) -> String {
    let digest = Sha256::digest(addr.ip().to_string().as_bytes());
    hex::encode(digest)
}

/// Applied to every request. Only `should_enforce_rate_limits()` gates
/// whether limits are actually checked (Open Question 1); when disabled the
/// request passes straight through with no headers added.
pub async fn enforce(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(rate_limits) = state.rate_limits.as_ref() else {
        return Ok(next.run(request).await);
    };
    if !state.config.should_enforce_rate_limits() {
        return Ok(next.run(request).await);
    }

    let ip_hash = hash_ip(&addr);
    let path = request.uri().path().to_string();

    let endpoint_state = rate_limits
        .check_endpoint_limit(&ip_hash, &path)
        .await
        .map_err(ApiError::from)?;

    let mut response = next.run(request).await;

    if let Some(state) = endpoint_state {
        let headers = response.headers_mut();
        insert_header(headers, "x-ratelimit-limit", state.limit);
        insert_header(headers, "x-ratelimit-remaining", state.remaining);
        insert_header(headers, "x-ratelimit-reset", state.reset_at.timestamp());
    }

    Ok(response)
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_hex_encoded() {
        let addr: SocketAddr = "203.0.113.7:443".parse().unwrap();
        let a = hash_ip(&addr);
        let b = hash_ip(&addr);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_ips_hash_differently() {
        let a: SocketAddr = "203.0.113.7:443".parse().unwrap();
        let b: SocketAddr = "198.51.100.2:443".parse().unwrap();
        assert_ne!(hash_ip(&a), hash_ip(&b));
    }

    #[test]
    fn port_is_not_part_of_the_hash() {
        let a: SocketAddr = "203.0.113.7:1".parse().unwrap();
        let b: SocketAddr = "203.0.113.7:65535".parse().unwrap();
        assert_eq!(hash_ip(&a), hash_ip(&b));
    }
}

/// Checks the download-specific limits (burst + per-category + total daily)
/// ahead of job creation. Separate from the generic endpoint middleware
/// above since it needs the request body's video type classification, which
/// isn't known until `POST /downloads` parses its payload.
pub async fn check_download_limits(
    state: &SharedState,
    addr: SocketAddr,
    video_type: VideoType,
) -> Result<(), DomainError> {
    let Some(rate_limits) = state.rate_limits.as_ref() else {
        return Ok(());
    };
    if !state.config.should_enforce_rate_limits() {
        return Ok(());
    }
    let ip_hash = hash_ip(&addr);
    rate_limits.check_download_limits(&ip_hash, video_type).await?;
    Ok(())
}
