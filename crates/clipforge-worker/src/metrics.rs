//! Prometheus metrics for worker observability.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ErrorCategoryLabel(pub String);

impl EncodeLabelSet for ErrorCategoryLabel {
    fn encode(&self, mut encoder: LabelSetEncoder) -> Result<(), std::fmt::Error> {
        ("category", self.0.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct WorkerMetrics {
    pub queue_depth: Gauge,
    pub inflight_jobs: Gauge,
    pub active_jobs: Gauge,
    pub jobs_completed: Counter,
    pub jobs_failed: Family<ErrorCategoryLabel, Counter>,
    pub jobs_retried: Counter,
    pub reaper_requeued: Counter,
    pub reaper_failed: Counter,
    pub reaper_files_expired: Counter,
    pub registry: Arc<Registry>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        macro_rules! gauge {
            ($name:literal, $help:literal) => {{
                let g = Gauge::default();
                registry.register($name, $help, g.clone());
                g
            }};
        }
        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = Counter::default();
                registry.register($name, $help, c.clone());
                c
            }};
        }

        let queue_depth = gauge!("clipforge_worker_queue_depth", "Jobs waiting to be claimed");
        let inflight_jobs = gauge!(
            "clipforge_worker_inflight_jobs",
            "Jobs claimed but not yet acked"
        );
        let active_jobs = gauge!(
            "clipforge_worker_active_jobs",
            "Jobs currently being processed by this worker"
        );
        let jobs_completed = counter!(
            "clipforge_worker_jobs_completed_total",
            "Total jobs completed successfully"
        );
        let jobs_retried = counter!(
            "clipforge_worker_jobs_retried_total",
            "Total jobs retried after a transient failure"
        );
        let reaper_requeued = counter!(
            "clipforge_reaper_jobs_requeued_total",
            "Orphaned jobs requeued by the reaper"
        );
        let reaper_failed = counter!(
            "clipforge_reaper_jobs_failed_total",
            "Stale jobs force-failed by the reaper"
        );
        let reaper_files_expired = counter!(
            "clipforge_reaper_files_expired_total",
            "Expired files deleted by the reaper"
        );

        let jobs_failed = Family::<ErrorCategoryLabel, Counter>::default();
        registry.register(
            "clipforge_worker_jobs_failed_total",
            "Total jobs failed by error category",
            jobs_failed.clone(),
        );

        Self {
            queue_depth,
            inflight_jobs,
            active_jobs,
            jobs_completed,
            jobs_failed,
            jobs_retried,
            reaper_requeued,
            reaper_failed,
            reaper_files_expired,
            registry: Arc::new(registry),
        }
    }

    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).unwrap();
        buf
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
