//! REST + WebSocket API: request/response shapes, route wiring, and the
//! rate-limit middleware sit here; `main.rs` only does Redis/env wiring.

pub mod config;
pub mod dto;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod rate_limit;
pub mod state;
pub mod ws;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use state::SharedState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the full router against an already-constructed `AppState`, so
/// tests can exercise it with `tower::ServiceExt::oneshot` without binding a
/// socket.
pub fn build_router(state: SharedState) -> Router {
    let cors = if state.config.cors_origin == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origin = state
            .config
            .cors_origin
            .parse()
            .unwrap_or(axum::http::HeaderValue::from_static("*"));
        CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
    };

    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/videos/resolutions", post(handlers::videos::resolve))
        .route("/downloads", post(handlers::downloads::create))
        .route("/downloads/file/:token", get(handlers::files::get))
        .route("/jobs/:id", get(handlers::jobs::get))
        .route("/jobs/:id", delete(handlers::jobs::cancel))
        .route("/ws", get(ws::handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit::enforce));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
