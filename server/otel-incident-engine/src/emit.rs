//! Incident emitter: turn admitted detections into IncidentEvents, persist them,
//! and forward them downstream.
//!
//! Persistence is the source of truth; forwarding is best-effort notification.
//! Both are attempted for every incident and neither failure undoes the other.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::EngineError;
use crate::types::*;

/// Durable artifact store for incident events.
#[async_trait]
pub trait IncidentStore: Send + Sync {
  async fn upload_json(&self, key: &str, event: &IncidentEvent) -> Result<(), EngineError>;
}

/// Downstream notification of a new incident.
#[async_trait]
pub trait IncidentForwarder: Send + Sync {
  async fn forward(&self, event: &IncidentEvent) -> Result<(), EngineError>;
}

/// Writes `<root>/<key>` as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct FsIncidentStore {
  root: PathBuf,
}

impl FsIncidentStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

#[async_trait]
impl IncidentStore for FsIncidentStore {
  async fn upload_json(&self, key: &str, event: &IncidentEvent) -> Result<(), EngineError> {
    let path = self.root.join(key);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(event)?;
    tokio::fs::write(&path, body).await?;
    Ok(())
  }
}

/// POSTs the serialized event to an ingestion URL.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
  client: reqwest::Client,
  url: String,
}

impl HttpForwarder {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      url: url.into(),
    })
  }
}

#[async_trait]
impl IncidentForwarder for HttpForwarder {
  async fn forward(&self, event: &IncidentEvent) -> Result<(), EngineError> {
    let resp = self.client.post(&self.url).json(event).send().await?;
    let status = resp.status();
    if !status.is_success() {
      return Err(EngineError::forward(format!("{} returned {}", self.url, status)));
    }
    Ok(())
  }
}

/// Fixed fields stamped onto every incident.
#[derive(Debug, Clone)]
pub struct EmitterContext {
  pub service_name: String,
  pub environment: String,
  pub version: String,
}

impl From<&Config> for EmitterContext {
  fn from(config: &Config) -> Self {
    Self {
      service_name: config.service_name.clone(),
      environment: config.environment.clone(),
      version: config.version.clone(),
    }
  }
}

/// What happened to one emitted incident.
#[derive(Debug, Clone)]
pub struct EmitOutcome {
  pub event: IncidentEvent,
  pub persisted: bool,
  /// `None` when no forwarder is configured.
  pub forwarded: Option<bool>,
}

/// Build the incident for an admitted detection (no I/O).
pub fn build_incident(
  result: &DetectionResult,
  ctx: &EmitterContext,
  id: Uuid,
  now: DateTime<Utc>,
) -> IncidentEvent {
  let (stacktrace, request_id) = match &result.signal {
    Signal::Span(span) => {
      let label = match result.kind {
        DetectionType::Exception => "Exception",
        _ => "Trace Issue",
      };
      (
        format!("{} in Span {}: {}", label, span.name, result.reason),
        span.trace_id.clone().unwrap_or_else(|| "unknown".into()),
      )
    }
    Signal::Log(log) => (
      format!("Log Issue: {}", log.body.as_deref().unwrap_or("Unknown log")),
      "unknown".to_string(),
    ),
  };

  let project_id = result.signal.project_id().map(str::to_string);

  IncidentEvent {
    id: id.to_string(),
    service_name: project_id.clone().unwrap_or_else(|| ctx.service_name.clone()),
    environment: EnvironmentInfo {
      env: ctx.environment.clone(),
      version: ctx.version.clone(),
    },
    timestamp: now.to_rfc3339(),
    severity: Severity::Critical,
    error_message: result.reason.clone(),
    stacktrace,
    request_id,
    detection_type: result.kind,
    project_id,
  }
}

/// Persists and forwards incidents through injected collaborators.
#[derive(Clone)]
pub struct IncidentEmitter {
  ctx: EmitterContext,
  store: Arc<dyn IncidentStore>,
  forwarder: Option<Arc<dyn IncidentForwarder>>,
}

impl IncidentEmitter {
  pub fn new(
    ctx: EmitterContext,
    store: Arc<dyn IncidentStore>,
    forwarder: Option<Arc<dyn IncidentForwarder>>,
  ) -> Self {
    Self {
      ctx,
      store,
      forwarder,
    }
  }

  /// Filesystem store plus HTTP forwarder (when a URL is configured).
  pub fn from_config(config: &Config) -> Result<Self, EngineError> {
    let store: Arc<dyn IncidentStore> = Arc::new(FsIncidentStore::new(&config.incident_dir));
    let forwarder = match &config.forward_url {
      Some(url) => Some(Arc::new(HttpForwarder::new(
        url.clone(),
        Duration::from_millis(config.forward_timeout_ms),
      )?) as Arc<dyn IncidentForwarder>),
      None => None,
    };
    Ok(Self::new(EmitterContext::from(config), store, forwarder))
  }

  /// Emit one admitted detection. Never fails; collaborator errors are logged.
  pub async fn emit(&self, result: &DetectionResult) -> EmitOutcome {
    let event = build_incident(result, &self.ctx, Uuid::new_v4(), Utc::now());
    let key = event.storage_key();

    let persisted = match self.store.upload_json(&key, &event).await {
      Ok(()) => true,
      Err(e) => {
        warn!(incident_id = %event.id, key = %key, error = %e, "incident persistence failed");
        false
      }
    };

    let forwarded = match &self.forwarder {
      Some(forwarder) => match forwarder.forward(&event).await {
        Ok(()) => Some(true),
        Err(e) => {
          warn!(incident_id = %event.id, error = %e, "incident forward failed");
          Some(false)
        }
      },
      None => None,
    };

    info!(
      incident_id = %event.id,
      service = %event.service_name,
      kind = ?event.detection_type,
      request_id = %event.request_id,
      persisted,
      "incident emitted: {}",
      event.error_message
    );

    EmitOutcome {
      event,
      persisted,
      forwarded,
    }
  }
}
