//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod account;
pub mod http;

/// Build the application router with:
/// - practice API under `/api/v1/...` (account from `x-account-id`)
/// - passage generation and grading endpoints
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    let api = Router::new()
        .route("/health", get(http::http_health))
        .route(
            "/sessions",
            get(http::http_list_sessions).post(http::http_start_session),
        )
        .route("/sessions/:id", get(http::http_get_session))
        .route("/sessions/:id/answers", post(http::http_post_answer))
        .route("/sessions/:id/complete", post(http::http_complete_session))
        .route("/sessions/:id/evidence", get(http::http_get_evidence))
        .route("/sessions/:id/word-detective", post(http::http_post_word_detective))
        .route(
            "/settings",
            get(http::http_get_settings).put(http::http_put_settings),
        )
        .route("/stats/today", get(http::http_today_stats))
        .route("/stats/week", get(http::http_week_stats))
        .route("/progress", get(http::http_progress))
        .route("/account/data", delete(http::http_reset_account))
        .route("/grade", post(http::http_post_grade))
        .route("/passages/generate", post(http::http_generate_passage));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
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
        // Frontend fallback
        .fallback_service(static_service)
}
