//! OpenTelemetry incident engine — detection + deduplication core.
//!
//! Normalizes OTLP/JSON trace and log exports, runs independent signal
//! detectors (HTTP 5xx, latency, exception events, error logs, crashes),
//! admits detections through a time-windowed dedupe cache, and emits critical
//! IncidentEvents to a persistence store and a downstream forwarder.
//!
//! Detectors and the dedupe cache are pure and infallible; only emitter I/O
//! can fail, and those failures are logged per incident.

pub mod config;
pub mod dedupe;
pub mod detect;
pub mod emit;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use dedupe::DedupeCache;
pub use emit::{EmitOutcome, IncidentEmitter, IncidentForwarder, IncidentStore};
pub use engine::{Engine, EngineStats};
pub use error::EngineError;
pub use pipeline::{PayloadKind, Pipeline};
pub use types::{DetectionResult, ExportLogsRequest, ExportTraceRequest, IncidentEvent};
