//! Core engine: owns the dedupe state, runs normalize -> detect -> admit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::dedupe::{self, DedupeCache};
use crate::detect;
use crate::normalize;
use crate::types::*;

/// Admission counters for the `/stats` surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
  pub admitted: u64,
  pub suppressed: u64,
  pub tracked_keys: usize,
}

/// The detection + admission engine. Shareable across threads; the dedupe
/// cache is the only mutable state and is locked per admission.
pub struct Engine {
  config: Config,
  dedupe: Mutex<DedupeCache>,
  admitted: AtomicU64,
  suppressed: AtomicU64,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    let dedupe = DedupeCache::new(config.dedupe_window_ms, config.dedupe_max_entries);
    Self {
      config,
      dedupe: Mutex::new(dedupe),
      admitted: AtomicU64::new(0),
      suppressed: AtomicU64::new(0),
    }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Detect on every span of a traces export and return the admitted results, in payload order.
  pub fn process_traces(&self, req: &ExportTraceRequest) -> Vec<DetectionResult> {
    self.process_traces_at(req, now_ms())
  }

  pub fn process_traces_at(&self, req: &ExportTraceRequest, now_ms: u64) -> Vec<DetectionResult> {
    let threshold = self.config.latency_threshold_ms;
    let candidates = normalize::normalize_traces(req)
      .into_iter()
      .flat_map(|span| detect::detect_span(&Arc::new(span), threshold));
    self.admit_all(candidates, now_ms)
  }

  /// Detect on every record of a logs export and return the admitted results, in payload order.
  pub fn process_logs(&self, req: &ExportLogsRequest) -> Vec<DetectionResult> {
    self.process_logs_at(req, now_ms())
  }

  pub fn process_logs_at(&self, req: &ExportLogsRequest, now_ms: u64) -> Vec<DetectionResult> {
    let candidates = normalize::normalize_logs(req)
      .into_iter()
      .flat_map(|log| detect::detect_log(&Arc::new(log)));
    self.admit_all(candidates, now_ms)
  }

  /// Single admission decision.
  pub fn admit(&self, result: &DetectionResult, now_ms: u64) -> bool {
    let admitted = self.dedupe.lock().admit(result, now_ms);
    if admitted {
      self.admitted.fetch_add(1, Ordering::Relaxed);
    } else {
      self.suppressed.fetch_add(1, Ordering::Relaxed);
      debug!(key = dedupe::dedupe_key(result), kind = ?result.kind, "duplicate suppressed");
    }
    admitted
  }

  pub fn stats(&self) -> EngineStats {
    EngineStats {
      admitted: self.admitted.load(Ordering::Relaxed),
      suppressed: self.suppressed.load(Ordering::Relaxed),
      tracked_keys: self.dedupe.lock().len(),
    }
  }

  fn admit_all<I>(&self, candidates: I, now_ms: u64) -> Vec<DetectionResult>
  where
    I: IntoIterator<Item = DetectionResult>,
  {
    candidates
      .into_iter()
      .filter(|r| self.admit(r, now_ms))
      .collect()
  }
}

fn now_ms() -> u64 {
  Utc::now().timestamp_millis().max(0) as u64
}
