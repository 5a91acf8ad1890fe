//! clipforge-worker binary — claims download jobs from the durable queue,
//! drives extraction/storage/completion, and runs the periodic reaper.

use anyhow::Result;
use clipforge_core::ports::{ArchiveRepository, FileRepository, JobRepository, ProgressPublisher};
use clipforge_extractor::ProcessExtractor;
use clipforge_storage::{config::storage_backend_from_env, SignedUrlService};
use clipforge_store::{
    KvStore, RedisArchiveRepository, RedisFileRepository, RedisJobRepository, RedisProgressChannel,
};
use clipforge_worker::config::WorkerConfig;
use clipforge_worker::file_manager::FileManager;
use clipforge_worker::health::{health_router, HealthState};
use clipforge_worker::job_manager::JobManager;
use clipforge_worker::metrics::WorkerMetrics;
use clipforge_worker::orchestrator::DownloadOrchestrator;
use clipforge_worker::pool::{WorkerPool, WorkerPoolConfig};
use clipforge_worker::reaper::{Reaper, ReaperConfig};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = WorkerConfig::from_env()?;
    info!(worker_id = %config.worker_id, "starting clipforge-worker");

    let store = KvStore::connect(&config.redis_url).await?;
    info!("connected to redis");

    let jobs_repo: Arc<dyn JobRepository> = Arc::new(RedisJobRepository::new(store.clone()));
    let files_repo: Arc<dyn FileRepository> = Arc::new(RedisFileRepository::new(store.clone()));
    let archive_repo: Arc<dyn ArchiveRepository> = Arc::new(RedisArchiveRepository::new(store.clone()));
    let progress: Arc<dyn ProgressPublisher> = Arc::new(RedisProgressChannel::new(&config.redis_url)?);

    let storage = storage_backend_from_env();
    let signed_urls = Arc::new(SignedUrlService::from_env(config.signed_url_secret.clone()));
    let extractor = Arc::new(ProcessExtractor::from_env());

    let job_manager = Arc::new(JobManager::new(jobs_repo.clone(), progress.clone()));
    let file_manager = Arc::new(FileManager::new(
        files_repo,
        storage,
        signed_urls,
        config.file_ttl_secs as i64,
    ));
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        extractor,
        job_manager.clone(),
        file_manager.clone(),
    ));
    let queue = Arc::new(clipforge_store::JobQueue::new(store.connection()));

    let worker_metrics = WorkerMetrics::new();
    let ready = Arc::new(AtomicBool::new(true));
    let health_state = Arc::new(HealthState {
        metrics: worker_metrics.clone(),
        ready: ready.clone(),
    });

    let metrics_port = config.metrics_port;
    let router = health_router(health_state);
    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{metrics_port}");
        info!(%addr, "metrics server listening");
        let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
        axum::serve(listener, router).await.unwrap();
    });

    let reaper = Arc::new(Reaper::new(
        job_manager,
        file_manager,
        Some(archive_repo),
        queue.clone(),
        worker_metrics.clone(),
        ReaperConfig {
            interval: Duration::from_secs(config.reaper_interval_secs),
            job_ttl: chrono::Duration::seconds(config.job_ttl_secs as i64),
            orphan_queue_claim_age: Duration::from_secs(config.orphan_timeout_secs),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .unwrap_or_else(|_| "/tmp/clipforge-downloads".to_string()),
        },
    ));
    reaper.spawn();
    info!(interval_secs = config.reaper_interval_secs, "reaper started");

    let pool = WorkerPool::new(
        queue,
        jobs_repo,
        orchestrator,
        worker_metrics,
        WorkerPoolConfig {
            concurrency: config.concurrency,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            soft_timeout: Duration::from_secs(config.soft_timeout_secs),
            hard_timeout: Duration::from_secs(config.hard_timeout_secs),
        },
    );

    let shutdown_signal = {
        let pool_handle = Arc::new(pool);
        let shutdown_pool = pool_handle.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received, draining worker pool");
            shutdown_pool.shutdown();
        });
        pool_handle
    };

    shutdown_signal.run().await;
    Ok(())
}
