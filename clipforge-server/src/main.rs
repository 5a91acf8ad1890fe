//! clipforge-server binary — the REST + WebSocket API: resolves video
//! metadata, enqueues download jobs for the worker pool, serves completed
//! artifacts, and relays progress over WebSocket.

use anyhow::Result;
use axum::Router;
use clipforge_core::ports::{FileRepository, JobRepository, MetadataExtractor, ProgressPublisher};
use clipforge_extractor::ProcessExtractor;
use clipforge_server::config::ServerConfig;
use clipforge_server::fanout::FanoutRegistry;
use clipforge_server::state::AppState;
use clipforge_storage::{config::storage_backend_from_env, SignedUrlService};
use clipforge_store::{JobQueue, KvStore, RedisFileRepository, RedisJobRepository, RedisProgressChannel};
use clipforge_worker::file_manager::FileManager;
use clipforge_worker::job_manager::JobManager;
use clipforge_worker::rate_limit_manager::{RateLimitConfig, RateLimitManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Arc::new(ServerConfig::from_env()?);
    info!(bind_addr = %config.bind_addr, "starting clipforge-server");

    let store = KvStore::connect(&config.redis_url).await?;
    info!("connected to redis");

    let jobs_repo: Arc<dyn JobRepository> = Arc::new(RedisJobRepository::new(store.clone()));
    let files_repo: Arc<dyn FileRepository> = Arc::new(RedisFileRepository::new(store.clone()));
    let progress_channel = Arc::new(RedisProgressChannel::new(&config.redis_url)?);
    let progress: Arc<dyn ProgressPublisher> = progress_channel.clone();

    let storage = storage_backend_from_env();
    let signed_urls = Arc::new(SignedUrlService::from_env(config.signed_url_secret.clone()));
    let extractor: Arc<dyn MetadataExtractor> = Arc::new(ProcessExtractor::from_env());

    let jobs = Arc::new(JobManager::new(jobs_repo, progress));
    let files = Arc::new(FileManager::new(
        files_repo,
        storage,
        signed_urls,
        config.file_ttl_secs as i64,
    ));
    let queue = Arc::new(JobQueue::new(store.connection()));
    let fanout = Arc::new(FanoutRegistry::new(progress_channel));

    let rate_limits = if config.should_enforce_rate_limits() {
        let rate_limit_repo = Arc::new(clipforge_store::RedisRateLimitRepository::new(store.clone()));
        Some(Arc::new(RateLimitManager::new(
            rate_limit_repo,
            RateLimitConfig::from_env(),
        )))
    } else {
        None
    };

    let state = Arc::new(AppState {
        jobs,
        files,
        extractor,
        queue,
        fanout,
        rate_limits,
        store,
        config: config.clone(),
    });

    let app: Router = clipforge_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
