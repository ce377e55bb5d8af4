//! Reading Coach · Practice Backend
//!
//! - Axum HTTP API (sessions, answers, stats, progress, settings)
//! - Optional OpenAI integration for passage generation and grading
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables (a `.env` file is read if present):
//!   PORT                    : u16 (default 3000)
//!   OPENAI_API_KEY          : enables OpenAI integration if present
//!   OPENAI_BASE_URL         : default "https://api.openai.com/v1"
//!   OPENAI_GENERATION_MODEL : default "gpt-4o"
//!   OPENAI_GRADING_MODEL    : default "gpt-4o-mini"
//!   OPENAI_TIMEOUT_SECS     : default 20
//!   READING_COACH_CONFIG    : path to TOML config (prompts, grading, practice, passage bank)
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use reading_coach_backend::routes::build_router;
use reading_coach_backend::state::AppState;
use reading_coach_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let dotenv = dotenvy::dotenv();
  telemetry::init_tracing();
  if let Ok(path) = dotenv {
    info!(target: "reading_coach", path = %path.display(), "Loaded .env");
  }

  let state = Arc::new(AppState::new());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "reading_coach", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "reading_coach", error = %e, "Could not listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "reading_coach", "Shutting down");
}
