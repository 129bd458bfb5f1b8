//! Engine + emitter: the async entry point shared by the binaries.

use std::sync::Arc;

use crate::config::Config;
use crate::emit::{EmitOutcome, IncidentEmitter};
use crate::engine::{Engine, EngineStats};
use crate::error::EngineError;
use crate::types::*;

/// Which OTLP signal a raw payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
  Traces,
  Logs,
}

impl PayloadKind {
  /// Guess from the top-level key of a JSON-lines replay record.
  pub fn sniff(value: &serde_json::Value) -> Option<Self> {
    if value.get("resourceSpans").is_some() {
      Some(Self::Traces)
    } else if value.get("resourceLogs").is_some() {
      Some(Self::Logs)
    } else {
      None
    }
  }
}

#[derive(Clone)]
pub struct Pipeline {
  engine: Arc<Engine>,
  emitter: IncidentEmitter,
}

impl Pipeline {
  pub fn new(engine: Arc<Engine>, emitter: IncidentEmitter) -> Self {
    Self { engine, emitter }
  }

  /// Engine and emitter wired from one config.
  pub fn from_config(config: Config) -> Result<Self, EngineError> {
    let emitter = IncidentEmitter::from_config(&config)?;
    Ok(Self::new(Arc::new(Engine::new(config)), emitter))
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }

  pub fn stats(&self) -> EngineStats {
    self.engine.stats()
  }

  pub async fn ingest_traces(&self, req: &ExportTraceRequest) -> Vec<EmitOutcome> {
    let admitted = self.engine.process_traces(req);
    self.emit_all(&admitted).await
  }

  pub async fn ingest_logs(&self, req: &ExportLogsRequest) -> Vec<EmitOutcome> {
    let admitted = self.engine.process_logs(req);
    self.emit_all(&admitted).await
  }

  /// Parse and ingest a raw JSON body. Only a JSON/shape error is returned.
  pub async fn ingest_json(&self, kind: PayloadKind, body: &[u8]) -> Result<Vec<EmitOutcome>, EngineError> {
    match kind {
      PayloadKind::Traces => {
        let req: ExportTraceRequest = serde_json::from_slice(body)?;
        Ok(self.ingest_traces(&req).await)
      }
      PayloadKind::Logs => {
        let req: ExportLogsRequest = serde_json::from_slice(body)?;
        Ok(self.ingest_logs(&req).await)
      }
    }
  }

  async fn emit_all(&self, admitted: &[DetectionResult]) -> Vec<EmitOutcome> {
    let mut out = Vec::with_capacity(admitted.len());
    for result in admitted {
      out.push(self.emitter.emit(result).await);
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn sniff_payload_kind() {
    assert_eq!(PayloadKind::sniff(&json!({"resourceSpans": []})), Some(PayloadKind::Traces));
    assert_eq!(PayloadKind::sniff(&json!({"resourceLogs": []})), Some(PayloadKind::Logs));
    assert_eq!(PayloadKind::sniff(&json!({"metrics": []})), None);
  }
}
