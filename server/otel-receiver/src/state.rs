//! Shared handler state.

use otel_incident_engine::Pipeline;

pub struct AppState {
  pub pipeline: Pipeline,
}
