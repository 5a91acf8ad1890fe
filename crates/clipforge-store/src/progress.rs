//! Redis Pub/Sub fan-out for job progress/status events, grounded on
//! `vclip-queue::progress::ProgressChannel`'s dual-write pattern (publish +
//! bounded history so a client that reconnects mid-job can catch up).

use async_trait::async_trait;
use chrono::Utc;
use clipforge_core::error::{DomainError, ErrorCategory};
use clipforge_core::job::{JobId, JobStatus};
use clipforge_core::ports::{DomainResult, ProgressPublisher};
use clipforge_core::progress::Progress;
use futures::Stream;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

const HISTORY_TTL_SECS: i64 = 3600;

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

fn channel_name(job_id: JobId) -> String {
    format!("progress:{job_id}")
}

fn history_key(job_id: JobId) -> String {
    format!("progress:history:{job_id}")
}

/// Wire event published on a job's progress channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { job_id: JobId, progress: Progress },
    Status {
        job_id: JobId,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_category: Option<ErrorCategory>,
    },
}

/// Publishes progress/status events to per-job Redis Pub/Sub channels, with
/// a bounded sorted-set history for clients that connect after the event
/// fired (spec component N).
pub struct RedisProgressChannel {
    client: redis::Client,
}

impl RedisProgressChannel {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    async fn publish_with_history(&self, job_id: JobId, event: &ProgressEvent) -> DomainResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(transport)?;
        let payload = serde_json::to_string(event).map_err(transport)?;
        let score = Utc::now().timestamp_millis() as f64;

        redis::pipe()
            .publish(channel_name(job_id), &payload)
            .ignore()
            .zadd(history_key(job_id), &payload, score)
            .ignore()
            .expire(history_key(job_id), HISTORY_TTL_SECS)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(transport)?;
        Ok(())
    }

    /// Subscribe to a job's live event stream. Used by the server's fan-out
    /// layer to bridge Redis Pub/Sub into per-WebSocket-subscriber channels.
    pub async fn subscribe(
        &self,
        job_id: JobId,
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>> {
        use futures::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel_name(job_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });
        Ok(Box::pin(stream))
    }

    pub async fn history_since(
        &self,
        job_id: JobId,
        since_ms: i64,
    ) -> anyhow::Result<Vec<ProgressEvent>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Vec<String> = conn
            .zrangebyscore(history_key(job_id), since_ms as f64, "+inf")
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect())
    }
}

#[async_trait]
impl ProgressPublisher for RedisProgressChannel {
    async fn publish(&self, job_id: JobId, progress: &Progress) -> DomainResult<()> {
        self.publish_with_history(
            job_id,
            &ProgressEvent::Progress {
                job_id,
                progress: progress.clone(),
            },
        )
        .await
    }

    async fn publish_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error_category: Option<ErrorCategory>,
    ) -> DomainResult<()> {
        self.publish_with_history(
            job_id,
            &ProgressEvent::Status {
                job_id,
                status,
                error_category,
            },
        )
        .await
    }
}
