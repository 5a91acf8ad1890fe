//! Time-limited signed URLs for file access, ported verbatim from
//! `original_source/backend/src/domain/file_storage/signed_url_service.py`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A generated signed URL and the inputs used to produce it.
#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub signature: Option<String>,
}

impl SignedUrl {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn remaining_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Resolves the base URL for download links and issues/validates signed
/// tokens. Base-URL priority: explicit config > `DOWNLOAD_BASE_URL` >
/// `API_BASE_URL` > relative path (Open Question 4).
pub struct SignedUrlService {
    secret_key: String,
    base_url: String,
}

impl SignedUrlService {
    pub fn new(secret_key: String, base_url: String) -> Self {
        Self {
            secret_key,
            base_url,
        }
    }

    /// Build a service from environment variables, following the same
    /// base-URL resolution chain as the original `SignedUrlService.__init__`.
    pub fn from_env(secret_key: String) -> Self {
        const DOWNLOAD_PATH_SUFFIX: &str = "/api/v1/downloads/file";
        let base_url = std::env::var("DOWNLOAD_BASE_URL")
            .ok()
            .or_else(|| std::env::var("API_BASE_URL").ok())
            .map(|base| format!("{}{DOWNLOAD_PATH_SUFFIX}", base.trim_end_matches('/')))
            .unwrap_or_else(|| DOWNLOAD_PATH_SUFFIX.to_string());
        Self::new(secret_key, base_url)
    }

    pub fn generate_signed_url(
        &self,
        token: &str,
        ttl_minutes: i64,
        include_signature: bool,
    ) -> SignedUrl {
        let expires_at = Utc::now() + chrono::Duration::minutes(ttl_minutes);
        self.generate_signed_url_at(token, expires_at, include_signature)
    }

    pub fn generate_signed_url_at(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        include_signature: bool,
    ) -> SignedUrl {
        let mut url = format!("{}/{token}", self.base_url);
        let signature = if include_signature {
            let sig = self.generate_signature(token, expires_at);
            url = format!("{url}?signature={sig}");
            Some(sig)
        } else {
            None
        };

        SignedUrl {
            url,
            token: token.to_string(),
            expires_at,
            signature,
        }
    }

    fn generate_signature(&self, token: &str, expires_at: DateTime<Utc>) -> String {
        let message = format!("{token}:{}", expires_at.to_rfc3339());
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time signature check — never branch on a byte-by-byte
    /// comparison here, matching `hmac.compare_digest` in the original.
    pub fn validate_signature(
        &self,
        token: &str,
        signature: &str,
        expires_at: DateTime<Utc>,
    ) -> bool {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{token}:{}", expires_at.to_rfc3339()).as_bytes());
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        mac.verify_slice(&provided).is_ok()
    }

    pub fn validate_token(
        &self,
        token: &str,
        signature: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> bool {
        if token.len() < 16 {
            return false;
        }
        if let (Some(signature), Some(expires_at)) = (signature, expires_at) {
            if !self.validate_signature(token, signature, expires_at) {
                return false;
            }
        }
        if let Some(expires_at) = expires_at {
            if Utc::now() >= expires_at {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SignedUrlService {
        SignedUrlService::new("test-secret".to_string(), "/api/v1/downloads/file".to_string())
    }

    #[test]
    fn signed_url_includes_signature_by_default() {
        let svc = service();
        let signed = svc.generate_signed_url("abc123", 10, true);
        assert!(signed.url.contains("signature="));
        assert!(signed.signature.is_some());
    }

    #[test]
    fn signature_round_trips() {
        let svc = service();
        let expires_at = Utc::now() + chrono::Duration::minutes(10);
        let signed = svc.generate_signed_url_at("abc123", expires_at, true);
        let signature = signed.signature.unwrap();
        assert!(svc.validate_signature("abc123", &signature, expires_at));
    }

    #[test]
    fn tampered_signature_fails() {
        let svc = service();
        let expires_at = Utc::now() + chrono::Duration::minutes(10);
        assert!(!svc.validate_signature("abc123", "deadbeef", expires_at));
    }

    #[test]
    fn tampered_token_fails_same_signature() {
        let svc = service();
        let expires_at = Utc::now() + chrono::Duration::minutes(10);
        let signed = svc.generate_signed_url_at("abc123", expires_at, true);
        let signature = signed.signature.unwrap();
        assert!(!svc.validate_signature("different-token", &signature, expires_at));
    }

    #[test]
    fn expired_url_is_expired() {
        let svc = service();
        let expires_at = Utc::now() - chrono::Duration::minutes(1);
        let signed = svc.generate_signed_url_at("abc123", expires_at, false);
        assert!(signed.is_expired());
        assert_eq!(signed.remaining_seconds(), 0);
    }

    #[test]
    fn validate_token_rejects_short_tokens() {
        let svc = service();
        assert!(!svc.validate_token("short", None, None));
    }

    #[test]
    fn base_url_resolution_falls_back_to_relative_path() {
        std::env::remove_var("DOWNLOAD_BASE_URL");
        std::env::remove_var("API_BASE_URL");
        let svc = SignedUrlService::from_env("secret".to_string());
        let signed = svc.generate_signed_url("abc123", 10, false);
        assert!(signed.url.starts_with("/api/v1/downloads/file/"));
    }
}
