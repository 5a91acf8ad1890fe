//! Local-filesystem `StorageBackend`, used in development and as the
//! fallback target when cloud storage fails to initialize.

use async_trait::async_trait;
use clipforge_core::error::DomainError;
use clipforge_core::ports::{DomainResult, StorageBackend};
use std::path::{Path, PathBuf};

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> DomainResult<PathBuf> {
        let candidate = self.root.join(path);
        // Reject any path that escapes `root` after join/normalization —
        // storage paths are server-generated but this guards against a
        // malformed or adversarial `path` ever reaching the filesystem.
        let normalized = normalize(&candidate);
        if !normalized.starts_with(&self.root) {
            return Err(DomainError::Validation(format!(
                "storage path escapes root: {path}"
            )));
        }
        Ok(normalized)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[async_trait]
impl StorageBackend for LocalFsBackend {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> DomainResult<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(transport)?;
        }
        tokio::fs::write(&full_path, bytes).await.map_err(transport)
    }

    async fn get(&self, path: &str) -> DomainResult<Vec<u8>> {
        let full_path = self.resolve(path)?;
        tokio::fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::NotFound(path.to_string())
            } else {
                transport(e)
            }
        })
    }

    async fn delete(&self, path: &str) -> DomainResult<()> {
        let full_path = self.resolve(path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(transport(e)),
        }
    }

    async fn exists(&self, path: &str) -> DomainResult<bool> {
        let full_path = self.resolve(path)?;
        Ok(tokio::fs::metadata(&full_path).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        backend
            .put("clips/a.mp4", b"hello".to_vec(), "video/mp4")
            .await
            .unwrap();
        assert!(backend.exists("clips/a.mp4").await.unwrap());
        let data = backend.get("clips/a.mp4").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        let err = backend.get("nope.mp4").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        backend.delete("nope.mp4").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        let err = backend
            .put("../escape.mp4", b"x".to_vec(), "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
