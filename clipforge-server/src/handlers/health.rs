//! `GET /health` — a liveness probe for orchestrators (spec ambient stack),
//! grounded on `clipforge_worker::health::health_router`'s shape but backed
//! by a real Redis round-trip rather than an in-process readiness flag.

use crate::dto::HealthResponse;
use crate::state::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let redis_ok = tokio::time::timeout(PROBE_TIMEOUT, state.store.exists("health:probe"))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);

    let queue_depth = if redis_ok {
        tokio::time::timeout(PROBE_TIMEOUT, state.queue.depth())
            .await
            .ok()
            .and_then(|r| r.ok())
    } else {
        None
    };

    let status = if redis_ok { "ok" } else { "degraded" };
    let code = if redis_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            redis: redis_ok,
            queue_depth,
        }),
    )
}
