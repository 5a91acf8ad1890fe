//! Redis-backed `FileRepository`. Files are dual-indexed: by token (the
//! primary key clients present) and by job id (so a job's artifact can be
//! located without the caller already holding the token).

use crate::kv::KvStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clipforge_core::error::DomainError;
use clipforge_core::file::{DownloadedFile, FileLookup, FileToken};
use clipforge_core::job::JobId;
use clipforge_core::ports::{DomainResult, FileRepository};
use redis::AsyncCommands;

const TOKEN_PREFIX: &str = "file:token:";
const JOB_INDEX_PREFIX: &str = "file:job:";
const FILE_SET_KEY: &str = "files:all";

fn token_key(token: &FileToken) -> String {
    format!("{TOKEN_PREFIX}{}", token.as_str())
}

fn job_index_key(job_id: JobId) -> String {
    format!("{JOB_INDEX_PREFIX}{job_id}")
}

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

pub struct RedisFileRepository {
    store: KvStore,
}

impl RedisFileRepository {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FileRepository for RedisFileRepository {
    async fn insert(&self, file: &DownloadedFile) -> DomainResult<()> {
        let payload = serde_json::to_string(file).map_err(transport)?;
        let ttl = (file.grace_deadline() - Utc::now())
            .num_seconds()
            .max(1) as u64;

        let mut conn = self.store.connection();
        redis::pipe()
            .set_ex(token_key(&file.token), &payload, ttl)
            .ignore()
            .set_ex(job_index_key_from_str(&file.job_id), file.token.as_str(), ttl)
            .ignore()
            .zadd(FILE_SET_KEY, file.token.as_str(), file.expires_at.timestamp())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn lookup(&self, token: &FileToken) -> DomainResult<FileLookup> {
        let raw = self.store.get(&token_key(token)).await.map_err(DomainError::Transport)?;
        let Some(raw) = raw else {
            return Ok(FileLookup::NotFound);
        };
        let file: DownloadedFile = serde_json::from_str(&raw).map_err(transport)?;
        if Utc::now() >= file.grace_deadline() {
            return Ok(FileLookup::Expired);
        }
        Ok(FileLookup::Found(file))
    }

    async fn get_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>> {
        let token_str = self
            .store
            .get(&job_index_key(job_id))
            .await
            .map_err(DomainError::Transport)?;
        let Some(token_str) = token_str else {
            return Ok(None);
        };
        match self.lookup(&FileToken::from(token_str)).await? {
            FileLookup::Found(file) => Ok(Some(file)),
            FileLookup::Expired | FileLookup::NotFound => Ok(None),
        }
    }

    async fn delete(&self, token: &FileToken) -> DomainResult<()> {
        let raw = self.store.get(&token_key(token)).await.map_err(DomainError::Transport)?;
        let mut conn = self.store.connection();
        let mut pipe = redis::pipe();
        pipe.del(token_key(token)).ignore();
        pipe.zrem(FILE_SET_KEY, token.as_str()).ignore();
        if let Some(raw) = raw {
            if let Ok(file) = serde_json::from_str::<DownloadedFile>(&raw) {
                pipe.del(job_index_key_from_str(&file.job_id)).ignore();
            }
        }
        pipe.query_async::<()>(&mut conn).await.map_err(transport)?;
        Ok(())
    }

    async fn list_expired(&self, as_of: DateTime<Utc>) -> DomainResult<Vec<DownloadedFile>> {
        let mut conn = self.store.connection();
        let tokens: Vec<String> = conn
            .zrangebyscore(FILE_SET_KEY, 0, as_of.timestamp())
            .await
            .map_err(transport)?;

        let mut expired = Vec::with_capacity(tokens.len());
        for token in tokens {
            let raw: Option<String> = conn
                .get(format!("{TOKEN_PREFIX}{token}"))
                .await
                .map_err(transport)?;
            if let Some(raw) = raw {
                if let Ok(file) = serde_json::from_str::<DownloadedFile>(&raw) {
                    expired.push(file);
                }
            } else {
                // Redis already evicted this key via TTL; drop the stale
                // sorted-set entry so the index doesn't grow unbounded.
                let _: Result<(), _> = conn.zrem(FILE_SET_KEY, &token).await;
            }
        }
        Ok(expired)
    }
}

fn job_index_key_from_str(job_id: &str) -> String {
    format!("{JOB_INDEX_PREFIX}{job_id}")
}
