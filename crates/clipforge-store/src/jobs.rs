//! Redis-backed `JobRepository`, grounded on
//! `original_source/backend/infrastructure/redis_job_repository.py`.

use crate::kv::KvStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clipforge_core::error::{DomainError, ErrorCategory};
use clipforge_core::file::FileToken;
use clipforge_core::job::{Job, JobId, JobStatus};
use clipforge_core::ports::{DomainResult, JobRepository};
use clipforge_core::progress::Progress;
use redis::AsyncCommands;

const KEY_PREFIX: &str = "job:";
const DEFAULT_TTL_SECS: u64 = 3600;

fn job_key(id: JobId) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

pub struct RedisJobRepository {
    store: KvStore,
    ttl_secs: u64,
}

impl RedisJobRepository {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_ttl(store: KvStore, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }
}

#[async_trait]
impl JobRepository for RedisJobRepository {
    async fn insert(&self, job: &Job) -> DomainResult<()> {
        let payload = serde_json::to_string(job).map_err(|e| transport(e))?;
        self.store
            .set_ex(&job_key(job.id), &payload, self.ttl_secs)
            .await
            .map_err(|e| DomainError::Transport(e))
    }

    async fn get(&self, id: JobId) -> DomainResult<Job> {
        let raw = self
            .store
            .get(&job_key(id))
            .await
            .map_err(DomainError::Transport)?
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| transport(e))
    }

    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<String>,
        error_category: Option<ErrorCategory>,
    ) -> DomainResult<Job> {
        let mut conn = self.store.connection();
        let result: redis::RedisResult<String> = self
            .store
            .scripts
            .update_status
            .key(job_key(id))
            .arg(status.to_string())
            .arg(Utc::now().to_rfc3339())
            .arg(error_message.unwrap_or_default())
            .arg(error_category.map(|c| c.to_string()).unwrap_or_default())
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(json) => serde_json::from_str(&json).map_err(|e| transport(e)),
            Err(e) if e.to_string().contains("not_found") => {
                Err(DomainError::NotFound(id.to_string()))
            }
            Err(e) if e.to_string().contains("invalid_transition") => Err(
                DomainError::InvalidTransition(format!("job {id} cannot transition to {status}")),
            ),
            Err(e) => Err(transport(e)),
        }
    }

    async fn update_progress(&self, id: JobId, progress: Progress) -> DomainResult<Job> {
        let mut conn = self.store.connection();
        let progress_json = serde_json::to_string(&progress).map_err(|e| transport(e))?;
        let result: redis::RedisResult<String> = self
            .store
            .scripts
            .update_progress
            .key(job_key(id))
            .arg(progress_json)
            .arg(Utc::now().to_rfc3339())
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(json) => serde_json::from_str(&json).map_err(|e| transport(e)),
            Err(e) if e.to_string().contains("not_found") => {
                Err(DomainError::NotFound(id.to_string()))
            }
            Err(e) if e.to_string().contains("terminal") => Err(DomainError::InvalidTransition(
                format!("job {id} is already terminal"),
            )),
            Err(e) if e.to_string().contains("regression") => Err(DomainError::Validation(
                format!("progress for job {id} may not decrease"),
            )),
            Err(e) => Err(transport(e)),
        }
    }

    async fn complete(
        &self,
        id: JobId,
        download_url: String,
        download_token: FileToken,
        expire_at: DateTime<Utc>,
    ) -> DomainResult<Job> {
        let mut conn = self.store.connection();
        let result: redis::RedisResult<String> = self
            .store
            .scripts
            .complete_job
            .key(job_key(id))
            .arg(Utc::now().to_rfc3339())
            .arg(download_url)
            .arg(download_token.as_str())
            .arg(expire_at.to_rfc3339())
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(json) => serde_json::from_str(&json).map_err(|e| transport(e)),
            Err(e) if e.to_string().contains("not_found") => {
                Err(DomainError::NotFound(id.to_string()))
            }
            Err(e) if e.to_string().contains("invalid_transition") => Err(
                DomainError::InvalidTransition(format!("job {id} is not in processing state")),
            ),
            Err(e) => Err(transport(e)),
        }
    }

    async fn delete(&self, id: JobId) -> DomainResult<()> {
        self.store
            .delete(&job_key(id))
            .await
            .map_err(DomainError::Transport)
    }

    async fn list_stale(&self, older_than: DateTime<Utc>) -> DomainResult<Vec<JobId>> {
        let mut conn = self.store.connection();
        let mut stale = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(format!("{KEY_PREFIX}*"))
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(|e| transport(e))?;

            for key in keys {
                let raw: Option<String> = conn.get(&key).await.map_err(|e| transport(e))?;
                let Some(raw) = raw else { continue };
                let Ok(job) = serde_json::from_str::<Job>(&raw) else {
                    continue;
                };
                if job.updated_at < older_than {
                    stale.push(job.id);
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(stale)
    }
}
