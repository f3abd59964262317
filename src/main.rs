//! Bài Tập · exercise sheet trainer backend
//!
//! - Axum HTTP API driving the exercise session (dashboard → exercise → results → review)
//! - Optional Gemini integration for sheet extraction and praise (via environment variables)
//! - Exercises persisted as one JSON document in a local blob store
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   BIND_ADDR          : listen address (default 127.0.0.1)
//!   PORT               : u16 (default 3000)
//!   GEMINI_API_KEY     : enables Gemini if present (API_KEY also accepted)
//!   GEMINI_BASE_URL    : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL       : default "gemini-2.5-flash"
//!   GEMINI_IMAGE_MODEL : enables illustrated praise when set
//!   APP_CONFIG_PATH    : path to TOML config (prompts, praise lines, storage, limits)
//!   DATA_DIR           : blob store directory (overrides config)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod seeds;
mod scoring;
mod session;
mod storage;
mod gemini;
mod extraction;
mod encouragement;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{
  net::{IpAddr, Ipv4Addr, SocketAddr},
  sync::Arc,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (session, blob store, Gemini client, prompts).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  // Single-user tool: loopback unless told otherwise.
  let ip: IpAddr = std::env::var("BIND_ADDR")
    .ok()
    .and_then(|a| a.parse().ok())
    .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
  let port = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .unwrap_or(3000);
  let addr = SocketAddr::new(ip, port);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "baitap_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "baitap_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "baitap_backend", "Shutdown signal received");
}
