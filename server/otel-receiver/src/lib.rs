//! OTLP/HTTP incident receiver
//!
//! HTTP service that accepts OTLP/JSON trace and log exports and runs them
//! through the incident engine. Bind to 127.0.0.1 by default (internal only).

mod handlers;
mod state;
mod types;

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use handlers::{health, ingest_logs, ingest_traces, stats};
pub use state::AppState;
pub use types::ExportResponse;

/// All receiver routes over shared state.
pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/stats", get(stats))
    .route("/v1/traces", post(ingest_traces))
    .route("/v1/logs", post(ingest_logs))
    .layer(CorsLayer::permissive())
    .with_state(state)
}
