//! Core types for the incident engine (OTLP/JSON contracts + internal models).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract — OTLP/JSON export requests)
// ---------------------------------------------------------------------------
//
// Every field is optional or defaulted: a payload that is missing parts of the
// resource -> scope -> record tree is "nothing to process", not an error.
// Unknown fields are silently ignored.

/// Treat an explicit JSON `null` like a missing key.
fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

/// Body of `POST /v1/traces`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTraceRequest {
  #[serde(default, deserialize_with = "null_default")]
  pub resource_spans: Vec<WireResourceSpans>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResourceSpans {
  #[serde(default)]
  pub resource: Option<WireResource>,
  #[serde(default, deserialize_with = "null_default")]
  pub scope_spans: Vec<WireScopeSpans>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireResource {
  #[serde(default, deserialize_with = "null_default")]
  pub attributes: Vec<WireKeyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireScopeSpans {
  #[serde(default, deserialize_with = "null_default")]
  pub spans: Vec<WireSpan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpan {
  #[serde(default)]
  pub trace_id: Option<String>,
  #[serde(default)]
  pub span_id: Option<String>,
  #[serde(default)]
  pub parent_span_id: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
  /// int64 nanos; proto3 JSON sends these as strings, some exporters as numbers.
  #[serde(default)]
  pub start_time_unix_nano: Option<Value>,
  #[serde(default)]
  pub end_time_unix_nano: Option<Value>,
  #[serde(default)]
  pub status: Option<WireStatus>,
  #[serde(default, deserialize_with = "null_default")]
  pub attributes: Vec<WireKeyValue>,
  #[serde(default, deserialize_with = "null_default")]
  pub events: Vec<WireSpanEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireStatus {
  /// Either the numeric enum value or its name (`STATUS_CODE_ERROR`).
  #[serde(default)]
  pub code: Option<Value>,
  #[serde(default)]
  pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpanEvent {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub time_unix_nano: Option<Value>,
  #[serde(default, deserialize_with = "null_default")]
  pub attributes: Vec<WireKeyValue>,
}

/// Body of `POST /v1/logs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportLogsRequest {
  #[serde(default, deserialize_with = "null_default")]
  pub resource_logs: Vec<WireResourceLogs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResourceLogs {
  #[serde(default)]
  pub resource: Option<WireResource>,
  #[serde(default, deserialize_with = "null_default")]
  pub scope_logs: Vec<WireScopeLogs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireScopeLogs {
  #[serde(default, deserialize_with = "null_default")]
  pub log_records: Vec<WireLogRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLogRecord {
  #[serde(default)]
  pub time_unix_nano: Option<Value>,
  #[serde(default)]
  pub severity_number: Option<Value>,
  #[serde(default)]
  pub severity_text: Option<String>,
  #[serde(default)]
  pub body: Option<WireAnyValue>,
  #[serde(default, deserialize_with = "null_default")]
  pub attributes: Vec<WireKeyValue>,
  #[serde(default)]
  pub trace_id: Option<String>,
  #[serde(default)]
  pub span_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireKeyValue {
  #[serde(default, deserialize_with = "null_default")]
  pub key: String,
  #[serde(default)]
  pub value: Option<WireAnyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAnyValue {
  #[serde(default)]
  pub string_value: Option<String>,
  #[serde(default)]
  pub int_value: Option<Value>,
  #[serde(default)]
  pub bool_value: Option<bool>,
  /// Number, or a proto3 JSON string such as `"NaN"` / `"Infinity"`.
  #[serde(default)]
  pub double_value: Option<Value>,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// Attribute value after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
  Str(String),
  Int(i64),
  Bool(bool),
  Double(f64),
}

impl AttrValue {
  /// Integer view: ints as-is, numeric strings parsed, everything else `None`.
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Int(n) => Some(*n),
      Self::Str(s) => s.trim().parse().ok(),
      _ => None,
    }
  }
}

impl fmt::Display for AttrValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Str(s) => f.write_str(s),
      Self::Int(n) => write!(f, "{}", n),
      Self::Bool(b) => write!(f, "{}", b),
      Self::Double(d) => write!(f, "{}", d),
    }
  }
}

pub type Attributes = HashMap<String, AttrValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
  #[default]
  Unset,
  Ok,
  Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanEvent {
  pub name: String,
  pub attributes: Attributes,
}

/// Canonical span after normalization. `end_time_nanos >= start_time_nanos`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSpan {
  pub trace_id: Option<String>,
  pub span_id: Option<String>,
  pub parent_span_id: Option<String>,
  pub name: String,
  pub start_time_nanos: u64,
  pub end_time_nanos: u64,
  pub status_code: StatusCode,
  pub attributes: Attributes,
  pub events: Vec<SpanEvent>,
  /// Resource-level service/project identifier.
  pub project_id: Option<String>,
}

impl NormalizedSpan {
  pub fn duration_nanos(&self) -> u64 {
    self.end_time_nanos.saturating_sub(self.start_time_nanos)
  }

  pub fn duration_ms(&self) -> f64 {
    self.duration_nanos() as f64 / 1e6
  }
}

/// Canonical log record after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedLog {
  pub time_nanos: u64,
  /// OTel severity scale, 1..=24; 0 when unspecified.
  pub severity_number: i32,
  pub severity_text: Option<String>,
  pub body: Option<String>,
  pub attributes: Attributes,
  pub trace_id: Option<String>,
  pub span_id: Option<String>,
  pub project_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
  HttpError,
  Latency,
  Exception,
  Crash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
  Span,
  Log,
}

/// The record a detection originated from. Shared, since one span can fire
/// several detectors.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
  Span(Arc<NormalizedSpan>),
  Log(Arc<NormalizedLog>),
}

impl Signal {
  pub fn scope(&self) -> Scope {
    match self {
      Self::Span(_) => Scope::Span,
      Self::Log(_) => Scope::Log,
    }
  }

  pub fn project_id(&self) -> Option<&str> {
    match self {
      Self::Span(span) => span.project_id.as_deref(),
      Self::Log(log) => log.project_id.as_deref(),
    }
  }
}

/// A positive finding from one detector. Detectors never emit negative results.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
  pub kind: DetectionType,
  pub reason: String,
  pub signal: Signal,
}

impl DetectionResult {
  pub fn scope(&self) -> Scope {
    self.signal.scope()
  }
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what we persist and forward)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
  pub env: String,
  pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEvent {
  pub id: String,
  pub service_name: String,
  pub environment: EnvironmentInfo,
  /// RFC 3339, UTC.
  pub timestamp: String,
  pub severity: Severity,
  pub error_message: String,
  /// Stack trace or synthesized context for the incident.
  pub stacktrace: String,
  pub request_id: String,
  pub detection_type: DetectionType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_id: Option<String>,
}

impl IncidentEvent {
  /// Persistence key for this incident's artifact.
  pub fn storage_key(&self) -> String {
    format!("incidents/{}/event.json", self.id)
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
    }
  }
}
