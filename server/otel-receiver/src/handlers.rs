//! HTTP handlers for the OTLP receiver.

use axum::{
  body::Bytes,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use std::sync::Arc;

use otel_incident_engine::{EngineStats, PayloadKind};

use crate::state::AppState;
use crate::types::{ErrorBody, ExportResponse};

pub async fn health() -> &'static str {
  "ok"
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<EngineStats> {
  Json(state.pipeline.stats())
}

pub async fn ingest_traces(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
  ingest(&state, PayloadKind::Traces, &body).await
}

pub async fn ingest_logs(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
  ingest(&state, PayloadKind::Logs, &body).await
}

/// 200 with an empty partial success for any well-shaped body; 500 only when
/// the body does not parse. Emitter failures never reach the response.
async fn ingest(state: &AppState, kind: PayloadKind, body: &[u8]) -> Response {
  match state.pipeline.ingest_json(kind, body).await {
    Ok(outcomes) => {
      if !outcomes.is_empty() {
        tracing::debug!(?kind, incidents = outcomes.len(), "ingest: incidents emitted");
      }
      (StatusCode::OK, Json(ExportResponse::default())).into_response()
    }
    Err(e) => {
      tracing::error!(?kind, error = %e, "ingest: payload rejected");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { error: e.to_string() }),
      )
        .into_response()
    }
  }
}
