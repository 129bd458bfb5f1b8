//! Engine configuration with sane defaults, overridable from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::EngineError;

/// Tunable thresholds and emitter wiring. Read once at construction.
#[derive(Debug, Clone)]
pub struct Config {
  /// Spans slower than this (strictly greater) fire the latency detector.
  pub latency_threshold_ms: u64,
  /// Suppression window for repeat detections under one dedupe key.
  pub dedupe_window_ms: u64,
  /// High-water mark that triggers an inline sweep of stale dedupe entries.
  pub dedupe_max_entries: usize,
  /// Fallback service name when a record carries no resource identifier.
  pub service_name: String,
  pub environment: String,
  pub version: String,
  /// Root directory for persisted incident artifacts.
  pub incident_dir: PathBuf,
  /// Downstream ingestion endpoint; forwarding is skipped when unset.
  pub forward_url: Option<String>,
  pub forward_timeout_ms: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      latency_threshold_ms: 2000,
      dedupe_window_ms: 30_000,
      dedupe_max_entries: 100,
      service_name: "unknown-service".into(),
      environment: "production".into(),
      version: "0.0.0".into(),
      incident_dir: PathBuf::from("./data"),
      forward_url: None,
      forward_timeout_ms: 10_000,
    }
  }
}

impl Config {
  /// Defaults overridden by any of the supported environment variables.
  pub fn from_env() -> Result<Self, EngineError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Same as [`Config::from_env`] with an injectable variable source.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("LATENCY_THRESHOLD_MS") {
      config.latency_threshold_ms = parse_number("LATENCY_THRESHOLD_MS", &v)?;
    }
    if let Some(v) = get("DEDUPE_WINDOW_MS") {
      config.dedupe_window_ms = parse_number("DEDUPE_WINDOW_MS", &v)?;
    }
    if let Some(v) = get("DEDUPE_MAX_ENTRIES") {
      config.dedupe_max_entries = parse_number("DEDUPE_MAX_ENTRIES", &v)?;
    }
    if let Some(v) = get("FORWARD_TIMEOUT_MS") {
      config.forward_timeout_ms = parse_number("FORWARD_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = get("SERVICE_NAME") {
      config.service_name = v;
    }
    if let Some(v) = get("DEPLOY_ENV") {
      config.environment = v;
    }
    if let Some(v) = get("SERVICE_VERSION") {
      config.version = v;
    }
    if let Some(v) = get("INCIDENT_STORE_DIR") {
      config.incident_dir = PathBuf::from(v);
    }
    config.forward_url = get("INCIDENT_FORWARD_URL");

    Ok(config)
  }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, EngineError> {
  raw
    .trim()
    .parse()
    .map_err(|_| EngineError::config(key, &format!("expected a non-negative integer, got {:?}", raw)))
}
