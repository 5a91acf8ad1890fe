//! Artifact storage for clipforge: local filesystem and cloud bucket
//! backends behind the `StorageBackend` port, plus HMAC-signed download
//! URLs.

pub mod cloud;
pub mod config;
pub mod local_fs;
pub mod signed_url;

pub use cloud::{CloudBucketBackend, CloudBucketConfig};
pub use config::storage_backend_from_env;
pub use local_fs::LocalFsBackend;
pub use signed_url::{SignedUrl, SignedUrlService};
