//! Downloaded-file lifecycle: register, resolve, delete, expiry sweep.
//! Wraps `FileRepository` + `StorageBackend` + `SignedUrlService` (spec
//! component I), grounded on
//! `original_source/backend/src/domain/file_storage/file_manager.py`.

use chrono::{DateTime, Duration, Utc};
use clipforge_core::file::{DownloadedFile, FileLookup, FileToken};
use clipforge_core::job::JobId;
use clipforge_core::ports::{DomainResult, FileRepository, StorageBackend};
use clipforge_storage::signed_url::SignedUrlService;
use std::sync::Arc;

pub struct FileManager {
    files: Arc<dyn FileRepository>,
    storage: Arc<dyn StorageBackend>,
    signed_urls: Arc<SignedUrlService>,
    file_ttl_secs: i64,
}

/// A freshly registered file and the signed URL clients should use to fetch it.
pub struct RegisteredFile {
    pub file: DownloadedFile,
    pub download_url: String,
}

impl FileManager {
    pub fn new(
        files: Arc<dyn FileRepository>,
        storage: Arc<dyn StorageBackend>,
        signed_urls: Arc<SignedUrlService>,
        file_ttl_secs: i64,
    ) -> Self {
        Self {
            files,
            storage,
            signed_urls,
            file_ttl_secs,
        }
    }

    pub async fn register(
        &self,
        job_id: JobId,
        storage_path: String,
        original_filename: String,
        content_type: String,
        size_bytes: u64,
    ) -> DomainResult<RegisteredFile> {
        let now = Utc::now();
        let token = FileToken::generate();
        let file = DownloadedFile {
            token: token.clone(),
            job_id: job_id.to_string(),
            storage_path,
            original_filename,
            content_type,
            size_bytes,
            created_at: now,
            expires_at: now + Duration::seconds(self.file_ttl_secs),
        };
        self.files.insert(&file).await?;

        let signed = self.signed_urls.generate_signed_url_at(
            token.as_str(),
            file.expires_at,
            true,
        );
        Ok(RegisteredFile {
            file,
            download_url: signed.url,
        })
    }

    /// Writes a completed artifact's bytes to the storage backend ahead of
    /// `register`. Kept distinct from `register` so the orchestrator can
    /// clean up the source temp file between the two steps.
    pub async fn put_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> DomainResult<()> {
        self.storage.put(path, bytes, content_type).await
    }

    pub async fn get_by_token(&self, token: &FileToken) -> DomainResult<FileLookup> {
        self.files.lookup(token).await
    }

    /// Resolves a bearer token against the signed-URL scheme and the file
    /// index in one step, returning the record and its bytes only once both
    /// the signature (if supplied) and expiry checks pass. Used by the
    /// `GET /downloads/file/{token}` handler so the HTTP boundary never has
    /// to reach past `FileManager` into storage or signing directly.
    pub async fn fetch(
        &self,
        token: &FileToken,
        signature: Option<&str>,
    ) -> DomainResult<(DownloadedFile, Vec<u8>)> {
        let file = match self.files.lookup(token).await? {
            FileLookup::Found(file) => file,
            FileLookup::Expired => {
                return Err(clipforge_core::error::DomainError::Gone(format!(
                    "file {token} has expired"
                )))
            }
            FileLookup::NotFound => {
                return Err(clipforge_core::error::DomainError::NotFound(format!(
                    "file {token} not found"
                )))
            }
        };

        // Expiry is already enforced by `lookup` against the grace deadline,
        // not `expires_at` directly, so the signature is checked on its own
        // here rather than through `validate_token`'s combined expiry gate —
        // that would reject an otherwise-valid request still inside the
        // grace window.
        if let Some(signature) = signature {
            if !self
                .signed_urls
                .validate_signature(token.as_str(), signature, file.expires_at)
            {
                return Err(clipforge_core::error::DomainError::Validation(
                    "invalid signature".to_string(),
                ));
            }
        }

        let bytes = self.storage.get(&file.storage_path).await?;
        Ok((file, bytes))
    }

    pub async fn get_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>> {
        self.files.get_by_job_id(job_id).await
    }

    /// Removes the index entries and, unless `keep_physical` is set, the
    /// underlying blob. Used both by explicit client delete and by the
    /// reaper's archival pipeline.
    pub async fn delete(&self, token: &FileToken, keep_physical: bool) -> DomainResult<()> {
        if !keep_physical {
            if let FileLookup::Found(file) = self.files.lookup(token).await? {
                if let Err(err) = self.storage.delete(&file.storage_path).await {
                    tracing::warn!(token = %token, error = %err, "failed to delete physical file, removing index anyway");
                }
            }
        }
        self.files.delete(token).await
    }

    /// Sweeps expired files: deletes the physical blob for each and then its
    /// index entries. Per-file failures are logged and tolerated so one bad
    /// blob never blocks the rest of the sweep.
    pub async fn cleanup_expired(&self, as_of: DateTime<Utc>) -> DomainResult<u64> {
        let expired = self.files.list_expired(as_of).await?;
        let mut deleted = 0u64;
        for file in expired {
            if let Err(err) = self.storage.delete(&file.storage_path).await {
                tracing::warn!(token = %file.token, error = %err, "storage delete failed during expiry sweep");
            }
            match self.files.delete(&file.token).await {
                Ok(()) => deleted += 1,
                Err(err) => tracing::warn!(token = %file.token, error = %err, "index delete failed during expiry sweep"),
            }
        }
        Ok(deleted)
    }
}
