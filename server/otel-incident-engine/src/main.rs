//! Binary entrypoint: replay OTLP/JSON exports from stdin, write incidents to stdout.
//!
//! Each input line is a traces (`resourceSpans`) or logs (`resourceLogs`)
//! export request. Output lines are either:
//! - An IncidentEvent (one per admitted detection)
//! - An ErrorOutput (when a line is not valid JSON)
//!
//! Lines that produce no admitted detection produce no output line.

use otel_incident_engine::types::ErrorOutput;
use otel_incident_engine::{Config, PayloadKind, Pipeline};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let pipeline = match Config::from_env().and_then(Pipeline::from_config) {
    Ok(p) => p,
    Err(e) => {
      let _ = writeln!(io::stderr(), "otel-incident-engine: {}", e);
      std::process::exit(1);
    }
  };

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        let _ = writeln!(io::stderr(), "otel-incident-engine: read error: {}", e);
        std::process::exit(1);
      }
    };

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        let err = ErrorOutput::new(format!("json parse: {}", e));
        let _ = serde_json::to_writer(&mut out, &err);
        let _ = writeln!(out);
        continue;
      }
    };

    // Neither signal present: nothing to process.
    let kind = match PayloadKind::sniff(&value) {
      Some(k) => k,
      None => continue,
    };

    match pipeline.ingest_json(kind, trimmed.as_bytes()).await {
      Ok(outcomes) => {
        for outcome in outcomes {
          let _ = serde_json::to_writer(&mut out, &outcome.event);
          let _ = writeln!(out);
        }
      }
      Err(e) => {
        let err = ErrorOutput::new(e.to_string());
        let _ = serde_json::to_writer(&mut out, &err);
        let _ = writeln!(out);
      }
    }
  }

  let _ = out.flush();
}
