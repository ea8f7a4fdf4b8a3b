//! Axum routes for the diagnostic chat and routine pipeline endpoints.
//!
//! REST Endpoints:
//! - GET  /                          - Health probe
//! - POST /api/chat                  - One diagnostic conversation turn
//! - POST /api/event                 - Persist a finalized diagnostic event
//! - GET  /api/events/:user_id       - All events for a user
//! - DELETE /api/session/:session_id - Discard session state
//! - POST /api/run-orchestrator      - Streaming routine pipeline (NDJSON)

use std::time::Duration;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

use super::handlers::{
    chat, clear_session, get_user_events, health, run_orchestrator, save_event, AppState,
};

/// Creates the API routing table.
///
/// The pipeline route streams for as long as the run takes, so the request
/// timeout applies to the other routes only.
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/event", post(save_event))
        .route("/events/:user_id", get(get_user_events))
        .route("/session/:session_id", delete(clear_session))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .route("/run-orchestrator", post(run_orchestrator))
}

/// Combined application router with middleware applied.
pub fn app_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/api", api_routes(config))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

/// Restricts CORS to the configured origins, or stays permissive when none
/// are configured (local development).
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
