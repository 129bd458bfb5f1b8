//! Time-windowed, size-bounded admission filter for detection results.
//!
//! A key is admitted when it has not been seen, or when its last admission is
//! at least one window old. Duplicates inside the window do not refresh the
//! timestamp, so a sustained burst is re-admitted once per window.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{DetectionResult, Signal};

const UNKNOWN_KEY: &str = "unknown";

/// Dedupe key for a detection.
///
/// Span detections key on the trace id when one is known; everything else
/// (including logs that carry a trace id) keys on the reason text. Detections
/// of different types from one trace therefore share a key.
pub fn dedupe_key(result: &DetectionResult) -> &str {
  if let Signal::Span(span) = &result.signal {
    if let Some(trace_id) = span.trace_id.as_deref() {
      if !trace_id.is_empty() && trace_id != UNKNOWN_KEY {
        return trace_id;
      }
    }
  }
  if result.reason.is_empty() {
    UNKNOWN_KEY
  } else {
    &result.reason
  }
}

/// Last-admitted timestamps (ms since epoch) per dedupe key.
#[derive(Debug)]
pub struct DedupeCache {
  entries: HashMap<String, u64>,
  window_ms: u64,
  max_entries: usize,
}

impl DedupeCache {
  pub fn new(window_ms: u64, max_entries: usize) -> Self {
    Self {
      entries: HashMap::new(),
      window_ms,
      max_entries,
    }
  }

  /// Decide whether `result` is a new incident at `now_ms`.
  pub fn admit(&mut self, result: &DetectionResult, now_ms: u64) -> bool {
    self.admit_key(dedupe_key(result), now_ms)
  }

  /// Admission check for an already-derived key.
  pub fn admit_key(&mut self, key: &str, now_ms: u64) -> bool {
    if let Some(&last) = self.entries.get(key) {
      if now_ms.saturating_sub(last) < self.window_ms {
        return false;
      }
    }

    self.entries.insert(key.to_string(), now_ms);
    if self.entries.len() > self.max_entries {
      self.sweep(now_ms);
    }
    true
  }

  /// Drop entries whose last admission is more than one window old.
  pub fn sweep(&mut self, now_ms: u64) -> usize {
    let before = self.entries.len();
    let window = self.window_ms;
    self.entries.retain(|_, last| now_ms.saturating_sub(*last) <= window);
    let removed = before - self.entries.len();
    if removed > 0 {
      debug!(removed, remaining = self.entries.len(), "dedupe sweep");
    }
    removed
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn window_ms(&self) -> u64 {
    self.window_ms
  }
}

impl Default for DedupeCache {
  fn default() -> Self {
    Self::new(30_000, 100)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::*;
  use std::collections::HashMap as Map;
  use std::sync::Arc;

  const WINDOW: u64 = 30_000;

  fn span_result(trace_id: Option<&str>, kind: DetectionType, reason: &str) -> DetectionResult {
    DetectionResult {
      kind,
      reason: reason.into(),
      signal: Signal::Span(Arc::new(NormalizedSpan {
        trace_id: trace_id.map(str::to_string),
        span_id: None,
        parent_span_id: None,
        name: "op".into(),
        start_time_nanos: 0,
        end_time_nanos: 0,
        status_code: StatusCode::Error,
        attributes: Map::new(),
        events: Vec::new(),
        project_id: None,
      })),
    }
  }

  fn log_result(trace_id: Option<&str>, reason: &str) -> DetectionResult {
    DetectionResult {
      kind: DetectionType::Exception,
      reason: reason.into(),
      signal: Signal::Log(Arc::new(NormalizedLog {
        time_nanos: 0,
        severity_number: 17,
        severity_text: None,
        body: None,
        attributes: Map::new(),
        trace_id: trace_id.map(str::to_string),
        span_id: None,
        project_id: None,
      })),
    }
  }

  #[test]
  fn fresh_key_is_admitted() {
    let mut cache = DedupeCache::default();
    assert!(cache.admit(&span_result(Some("t1"), DetectionType::HttpError, "a"), 1_000));
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn window_boundary_is_inclusive_exclusive() {
    let mut cache = DedupeCache::new(WINDOW, 100);
    let r = span_result(Some("t1"), DetectionType::HttpError, "a");
    let t0 = 1_000_000;
    assert!(cache.admit(&r, t0));
    assert!(!cache.admit(&r, t0 + WINDOW - 1));
    assert!(cache.admit(&r, t0 + WINDOW));
  }

  #[test]
  fn duplicates_do_not_refresh_the_window() {
    let mut cache = DedupeCache::new(WINDOW, 100);
    let r = span_result(Some("t1"), DetectionType::Latency, "slow");
    assert!(cache.admit(&r, 0));
    for t in (1_000..WINDOW).step_by(1_000) {
      assert!(!cache.admit(&r, t));
    }
    assert!(cache.admit(&r, WINDOW));
    assert!(!cache.admit(&r, WINDOW + 1));
  }

  #[test]
  fn span_keys_on_trace_id_regardless_of_reason() {
    let a = span_result(Some("abc123"), DetectionType::HttpError, "HTTP 500 Error: x");
    let b = span_result(Some("abc123"), DetectionType::Latency, "High Latency: 1ms");
    assert_eq!(dedupe_key(&a), "abc123");
    assert_eq!(dedupe_key(&b), "abc123");

    let mut cache = DedupeCache::default();
    assert!(cache.admit(&a, 0));
    // Different type, same trace: suppressed.
    assert!(!cache.admit(&b, 10));
  }

  #[test]
  fn span_without_usable_trace_id_keys_on_reason() {
    assert_eq!(dedupe_key(&span_result(None, DetectionType::HttpError, "r1")), "r1");
    assert_eq!(dedupe_key(&span_result(Some(""), DetectionType::HttpError, "r2")), "r2");
    assert_eq!(dedupe_key(&span_result(Some("unknown"), DetectionType::HttpError, "r3")), "r3");
  }

  #[test]
  fn logs_never_key_on_trace_id() {
    let r = log_result(Some("abc123"), "Error Log: db down");
    assert_eq!(dedupe_key(&r), "Error Log: db down");
  }

  #[test]
  fn anonymous_results_share_the_unknown_key() {
    let a = span_result(None, DetectionType::HttpError, "");
    let b = log_result(None, "");
    assert_eq!(dedupe_key(&a), "unknown");
    assert_eq!(dedupe_key(&b), "unknown");

    let mut cache = DedupeCache::default();
    assert!(cache.admit(&a, 0));
    assert!(!cache.admit(&b, 1));
  }

  #[test]
  fn sweep_runs_when_high_water_mark_is_crossed() {
    let mut cache = DedupeCache::new(WINDOW, 100);
    // 90 keys that will be stale, 10 fresh ones.
    for i in 0..90 {
      assert!(cache.admit_key(&format!("old-{}", i), i));
    }
    let now = 200_000;
    for i in 0..10 {
      assert!(cache.admit_key(&format!("new-{}", i), now - 10 + i));
    }
    assert_eq!(cache.len(), 100);

    assert!(cache.admit_key("trigger", now));
    assert!(cache.len() <= 11, "len after sweep: {}", cache.len());
    assert!(cache.contains("trigger"));
    assert!(!cache.contains("old-0"));
  }

  #[test]
  fn no_sweep_at_or_below_high_water_mark() {
    let mut cache = DedupeCache::new(10, 5);
    for i in 0..5 {
      cache.admit_key(&format!("k{}", i), 0);
    }
    // All stale but the mark was never exceeded.
    assert_eq!(cache.len(), 5);
  }

  #[test]
  fn sweep_keeps_entries_exactly_one_window_old() {
    let mut cache = DedupeCache::new(WINDOW, 100);
    cache.admit_key("edge", 0);
    cache.admit_key("stale", 0);
    cache.admit_key("stale", WINDOW); // re-admitted, refreshed
    assert_eq!(cache.sweep(WINDOW), 0);
    assert_eq!(cache.sweep(WINDOW + 1), 1);
    assert!(!cache.contains("edge"));
    assert!(cache.contains("stale"));
  }
}
