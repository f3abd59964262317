//! Router assembly: HTTP endpoints, static files, CORS, body limit and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers); the server binds to loopback by default
/// - Upload body limit from config
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    // Multipart framing on top of the file itself.
    let body_limit = state.config.limits.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/session", get(http::http_get_session))
        .route("/api/v1/session/events", post(http::http_post_event))
        .route("/api/v1/exercises", post(http::http_post_exercise))
        .route("/api/v1/exercises/:id/file", get(http::http_get_original_file))
        .route("/api/v1/results/encouragement", get(http::http_get_encouragement))
        .route("/api/v1/review", get(http::http_get_review))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
