//! Reliable work queue: an `active` list workers pop from and an `inflight`
//! list holding claimed-but-unacked job ids, grounded on
//! `apalis-redis::storage`'s `{queue}:active` / `{queue}:inflight` key
//! design (BRPOPLPUSH-style claim, explicit ack to retire).

use clipforge_core::job::JobId;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

const ACTIVE_LIST: &str = "queue:downloads:active";
const INFLIGHT_LIST: &str = "queue:downloads:inflight";
const CLAIMED_AT_HASH: &str = "queue:downloads:claimed_at";

#[derive(Clone)]
pub struct JobQueue {
    conn: ConnectionManager,
}

impl JobQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Enqueue a job id for pickup by any worker.
    pub async fn push(&self, job_id: JobId) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(ACTIVE_LIST, job_id.to_string())
            .await?;
        Ok(())
    }

    /// Atomically move the next job from `active` to `inflight`, recording a
    /// claim timestamp the reaper uses to detect a worker that died
    /// mid-processing. Blocks up to `timeout` waiting for work.
    pub async fn claim(&self, timeout: Duration) -> anyhow::Result<Option<JobId>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .brpoplpush(ACTIVE_LIST, INFLIGHT_LIST, timeout.as_secs_f64())
            .await?;
        let Some(raw) = raw else { return Ok(None) };
        let job_id: JobId = raw.parse()?;
        conn.hset::<_, _, _, ()>(
            CLAIMED_AT_HASH,
            raw,
            chrono::Utc::now().timestamp(),
        )
        .await?;
        Ok(Some(job_id))
    }

    /// Retire a job from `inflight` after it reaches a terminal state.
    pub async fn ack(&self, job_id: JobId) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let raw = job_id.to_string();
        redis::pipe()
            .lrem(INFLIGHT_LIST, 1, &raw)
            .ignore()
            .hdel(CLAIMED_AT_HASH, &raw)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Move a job back from `inflight` to `active` for another worker to
    /// pick up — used for the single transient-error retry and by the
    /// reaper when it reclaims an orphaned inflight entry.
    pub async fn requeue(&self, job_id: JobId) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let raw = job_id.to_string();
        redis::pipe()
            .lrem(INFLIGHT_LIST, 1, &raw)
            .ignore()
            .lpush(ACTIVE_LIST, &raw)
            .ignore()
            .hdel(CLAIMED_AT_HASH, &raw)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Job ids claimed longer than `older_than` ago without being acked —
    /// the worker that claimed them is presumed dead. Used by the reaper's
    /// orphaned-job sweep.
    pub async fn list_orphaned(&self, older_than: Duration) -> anyhow::Result<Vec<JobId>> {
        let mut conn = self.conn.clone();
        let claims: Vec<(String, i64)> = conn.hgetall(CLAIMED_AT_HASH).await?;
        let cutoff = chrono::Utc::now().timestamp() - older_than.as_secs() as i64;
        Ok(claims
            .into_iter()
            .filter(|(_, claimed_at)| *claimed_at < cutoff)
            .filter_map(|(raw, _)| raw.parse().ok())
            .collect())
    }

    pub async fn depth(&self) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(ACTIVE_LIST).await?;
        Ok(len)
    }

    pub async fn inflight_count(&self) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(INFLIGHT_LIST).await?;
        Ok(len)
    }
}
