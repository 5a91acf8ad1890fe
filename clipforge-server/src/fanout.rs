//! In-process WebSocket fan-out (spec component N, server half): bridges
//! `RedisProgressChannel`'s per-job Pub/Sub into per-subscriber bounded
//! channels. A background task subscribes to a job's Redis channel on its
//! first WebSocket subscriber and is torn down on its last.

use clipforge_core::error::ErrorCategory;
use clipforge_core::job::{JobId, JobStatus};
use clipforge_core::progress::Progress;
use clipforge_store::progress::{ProgressEvent, RedisProgressChannel};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

/// Bounded so a slow/stalled WebSocket write task can't make the Redis
/// subscriber task back up; a full channel drops the event rather than
/// blocking the broadcast for every other subscriber in the room. Shared
/// with `ws.rs`, which owns the sender/receiver pair for each connection.
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    JobProgress { job_id: String, progress: Progress },
    JobCompleted { job_id: String },
    JobFailed { job_id: String, error_category: Option<ErrorCategory> },
    JobCancelled { job_id: String },
}

impl ServerEvent {
    fn from_progress_event(job_id: JobId, event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::Progress { progress, .. } => Self::JobProgress {
                job_id: job_id.to_string(),
                progress,
            },
            ProgressEvent::Status {
                status: JobStatus::Completed,
                ..
            } => Self::JobCompleted {
                job_id: job_id.to_string(),
            },
            ProgressEvent::Status {
                status: JobStatus::Failed,
                error_category,
                ..
            } => {
                if error_category == Some(ErrorCategory::Cancelled) {
                    Self::JobCancelled {
                        job_id: job_id.to_string(),
                    }
                } else {
                    Self::JobFailed {
                        job_id: job_id.to_string(),
                        error_category,
                    }
                }
            }
            ProgressEvent::Status { status, .. } => Self::JobProgress {
                job_id: job_id.to_string(),
                progress: Progress {
                    percentage: 0,
                    phase: status.to_string(),
                    speed: None,
                    eta: None,
                },
            },
        }
    }
}

type Subscribers = Arc<RwLock<HashMap<Uuid, mpsc::Sender<ServerEvent>>>>;

struct Room {
    subscribers: Subscribers,
    relay: JoinHandle<()>,
}

pub struct FanoutRegistry {
    progress: Arc<RedisProgressChannel>,
    rooms: RwLock<HashMap<JobId, Room>>,
}

impl FanoutRegistry {
    pub fn new(progress: Arc<RedisProgressChannel>) -> Self {
        Self {
            progress,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Joins `subscriber_id` to `job_id`'s room, delivering events onto the
    /// caller's own outgoing channel — the same sender is reused across every
    /// job a single WebSocket connection subscribes to, so one client needs
    /// only one receive loop regardless of how many jobs it's watching.
    pub async fn subscribe(
        &self,
        job_id: JobId,
        subscriber_id: Uuid,
        sender: mpsc::Sender<ServerEvent>,
    ) {
        let mut rooms = self.rooms.write().await;

        if let Some(room) = rooms.get(&job_id) {
            room.subscribers.write().await.insert(subscriber_id, sender);
            return;
        }

        let subscribers: Subscribers = Arc::new(RwLock::new(HashMap::new()));
        subscribers.write().await.insert(subscriber_id, sender);

        let relay_subscribers = subscribers.clone();
        let progress = self.progress.clone();
        let relay = tokio::spawn(async move {
            let mut stream = match progress.subscribe(job_id).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "failed to subscribe to job progress channel");
                    return;
                }
            };
            while let Some(event) = stream.next().await {
                let server_event = ServerEvent::from_progress_event(job_id, event);
                let subs = relay_subscribers.read().await;
                for sender in subs.values() {
                    let _ = sender.try_send(server_event.clone());
                }
            }
        });

        rooms.insert(
            job_id,
            Room {
                subscribers,
                relay,
            },
        );
    }

    pub async fn unsubscribe(&self, job_id: JobId, subscriber_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(&job_id) else {
            return;
        };
        let remaining = {
            let mut subs = room.subscribers.write().await;
            subs.remove(&subscriber_id);
            subs.len()
        };
        if remaining == 0 {
            if let Some(room) = rooms.remove(&job_id) {
                room.relay.abort();
            }
        }
    }

    /// Number of jobs with at least one live subscriber; surfaced for tests
    /// and metrics.
    pub async fn active_rooms(&self) -> usize {
        self.rooms.read().await.len()
    }
}
