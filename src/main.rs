//! Learniverse · Educational Wizard Backend
//!
//! - Axum HTTP + WebSocket API driving the onboarding → subject → topic → api key →
//!   lesson → quiz wizard
//! - Lesson/quiz generation through Gemini or OpenAI with the learner's own key
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT             : u16 (default 3000)
//!   APP_CONFIG_PATH  : path to TOML config (prompts, provider endpoints, extra topics)
//!   GEMINI_BASE_URL  : default "https://generativelanguage.googleapis.com"
//!   GEMINI_MODEL     : default "gemini-1.5-flash"
//!   OPENAI_BASE_URL  : default "https://api.openai.com"
//!   OPENAI_MODEL     : default "gpt-4o-mini"
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod catalog;
mod fallback;
mod providers;
mod content;
mod scoring;
mod wizard;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (config, catalog, HTTP client, sessions).
  let state = Arc::new(AppState::new());
  // Evicts abandoned HTTP sessions (and the keys they hold).
  state.spawn_idle_sweeper();

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "learniverse", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "learniverse", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "learniverse", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "learniverse", "Shutdown requested");
}
