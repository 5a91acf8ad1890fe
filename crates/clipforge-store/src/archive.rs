//! Redis-backed `ArchiveRepository`: a permanent sorted-set index plus a
//! per-job hash, written by the reaper after a terminal job is evicted from
//! the live job hash.

use crate::kv::KvStore;
use async_trait::async_trait;
use clipforge_core::error::DomainError;
use clipforge_core::archive::JobArchive;
use clipforge_core::ports::{ArchiveRepository, DomainResult};
use redis::AsyncCommands;

const ARCHIVE_PREFIX: &str = "archive:job:";
const ARCHIVE_INDEX_KEY: &str = "archive:index";

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

pub struct RedisArchiveRepository {
    store: KvStore,
}

impl RedisArchiveRepository {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ArchiveRepository for RedisArchiveRepository {
    async fn archive(&self, archive: &JobArchive) -> DomainResult<()> {
        let payload = serde_json::to_string(archive).map_err(transport)?;
        let mut conn = self.store.connection();
        redis::pipe()
            .set(format!("{ARCHIVE_PREFIX}{}", archive.id), &payload)
            .ignore()
            .zadd(ARCHIVE_INDEX_KEY, archive.id.to_string(), archive.completed_at.timestamp())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(transport)?;
        Ok(())
    }
}
