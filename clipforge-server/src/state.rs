//! Shared application state threaded through every handler via `State`.

use crate::config::ServerConfig;
use crate::fanout::FanoutRegistry;
use clipforge_core::ports::MetadataExtractor;
use clipforge_store::{JobQueue, KvStore};
use clipforge_worker::file_manager::FileManager;
use clipforge_worker::job_manager::JobManager;
use clipforge_worker::rate_limit_manager::RateLimitManager;
use std::sync::Arc;

pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub files: Arc<FileManager>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub queue: Arc<JobQueue>,
    pub fanout: Arc<FanoutRegistry>,
    pub rate_limits: Option<Arc<RateLimitManager>>,
    pub store: KvStore,
    pub config: Arc<ServerConfig>,
}

pub type SharedState = Arc<AppState>;
