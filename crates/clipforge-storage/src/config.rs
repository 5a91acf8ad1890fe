//! Storage backend selection, grounded on
//! `original_source/backend/infrastructure/storage_factory.py`: a cloud
//! bucket is used when configured, falling back to local disk if bucket
//! configuration is present but initialization fails.

use crate::cloud::{CloudBucketBackend, CloudBucketConfig};
use crate::local_fs::LocalFsBackend;
use clipforge_core::ports::StorageBackend;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_DOWNLOAD_DIR: &str = "/tmp/clipforge-downloads";

/// Build the configured `StorageBackend` from environment variables.
///
/// `STORAGE_BUCKET_NAME` present -> attempt cloud storage, falling back to
/// local filesystem storage if the bucket client fails to initialize.
/// Otherwise -> local filesystem storage rooted at `DOWNLOAD_DIR`.
pub fn storage_backend_from_env() -> Arc<dyn StorageBackend> {
    match std::env::var("STORAGE_BUCKET_NAME") {
        Ok(bucket_name) if !bucket_name.trim().is_empty() => {
            let config = CloudBucketConfig {
                bucket_name,
                region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
                access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID").unwrap_or_default(),
                secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                    .unwrap_or_default(),
                endpoint_url: std::env::var("STORAGE_ENDPOINT_URL").ok(),
                allow_http: std::env::var("STORAGE_ALLOW_HTTP")
                    .map(|v| v == "true")
                    .unwrap_or(false),
            };
            match CloudBucketBackend::new(&config) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    warn!(error = %e, "failed to initialize cloud storage, falling back to local filesystem");
                    local_backend()
                }
            }
        }
        _ => local_backend(),
    }
}

fn local_backend() -> Arc<dyn StorageBackend> {
    let download_dir =
        std::env::var("DOWNLOAD_DIR").unwrap_or_else(|_| DEFAULT_DOWNLOAD_DIR.to_string());
    Arc::new(LocalFsBackend::new(download_dir))
}
