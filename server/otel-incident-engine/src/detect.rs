//! Signal detectors: classify normalized spans and logs into incident candidates.
//!
//! Each check is independent and may co-fire with the others on the same record.
//! Absent or malformed attributes mean "not triggered", never an error.

use std::sync::Arc;

use crate::types::*;

/// Minimum OTel severity number for ERROR and worse.
pub const ERROR_SEVERITY: i32 = 17;

const CRASH_PATTERN: &str = "Process exited with code";

/// Run the span checks in order: HTTP error, latency, then one result per exception event.
pub fn detect_span(span: &Arc<NormalizedSpan>, latency_threshold_ms: u64) -> Vec<DetectionResult> {
  let mut out = Vec::new();
  let signal = || Signal::Span(Arc::clone(span));

  if let Some(code) = http_error_code(span) {
    out.push(DetectionResult {
      kind: DetectionType::HttpError,
      reason: format!("HTTP {} Error: {}", code, span.name),
      signal: signal(),
    });
  }

  let duration_ms = span.duration_ms();
  if duration_ms > latency_threshold_ms as f64 {
    out.push(DetectionResult {
      kind: DetectionType::Latency,
      reason: format!(
        "High Latency: {:.2}ms (Threshold: {}ms)",
        duration_ms, latency_threshold_ms
      ),
      signal: signal(),
    });
  }

  for event in span.events.iter().filter(|e| e.name == "exception") {
    let exc_type = attr_string(&event.attributes, "exception.type").unwrap_or_else(|| "Error".into());
    let message = attr_string(&event.attributes, "exception.message")
      .unwrap_or_else(|| "Unknown Exception".into());
    out.push(DetectionResult {
      kind: DetectionType::Exception,
      reason: format!("Uncaught Exception: {}: {}", exc_type, message),
      signal: signal(),
    });
  }

  out
}

/// Run the log checks in order: severity, then crash pattern.
pub fn detect_log(log: &Arc<NormalizedLog>) -> Vec<DetectionResult> {
  let mut out = Vec::new();
  let body = log.body.as_deref().unwrap_or_default();

  if log.severity_number >= ERROR_SEVERITY {
    out.push(DetectionResult {
      kind: DetectionType::Exception,
      reason: format!("Error Log: {}", body),
      signal: Signal::Log(Arc::clone(log)),
    });
  }

  if body.contains(CRASH_PATTERN) {
    out.push(DetectionResult {
      kind: DetectionType::Crash,
      reason: format!("Process Crash: {}", body),
      signal: Signal::Log(Arc::clone(log)),
    });
  }

  out
}

/// `Some(code)` when the span errored with a 5xx `http.status_code`.
fn http_error_code(span: &NormalizedSpan) -> Option<i64> {
  if span.status_code != StatusCode::Error {
    return None;
  }
  let code = span
    .attributes
    .get("http.status_code")
    .and_then(AttrValue::as_i64)
    .unwrap_or(0);
  (code >= 500).then_some(code)
}

fn attr_string(attrs: &Attributes, key: &str) -> Option<String> {
  attrs.get(key).map(|v| v.to_string())
}
