//! Normalize OTLP/JSON export requests into flat span and log sequences.
//!
//! Pure transform: missing arrays mean "nothing to process", unparsable values
//! fall back to defaults, unknown attribute keys pass through untouched.

use serde_json::Value;

use crate::types::*;

/// Resource attribute keys that identify the emitting service, lowest
/// precedence first.
const PROJECT_KEYS: [&str; 3] = ["service.name", "service.namespace", "project.id"];

/// Flatten a traces export into spans, preserving resource -> scope -> span order.
pub fn normalize_traces(req: &ExportTraceRequest) -> Vec<NormalizedSpan> {
  let mut out = Vec::new();
  for rs in &req.resource_spans {
    let project_id = rs.resource.as_ref().and_then(project_id);
    for ss in &rs.scope_spans {
      for span in &ss.spans {
        out.push(normalize_span(span, project_id.clone()));
      }
    }
  }
  out
}

/// Flatten a logs export into log records, preserving resource -> scope -> record order.
pub fn normalize_logs(req: &ExportLogsRequest) -> Vec<NormalizedLog> {
  let mut out = Vec::new();
  for rl in &req.resource_logs {
    let project_id = rl.resource.as_ref().and_then(project_id);
    for sl in &rl.scope_logs {
      for record in &sl.log_records {
        out.push(normalize_log(record, project_id.clone()));
      }
    }
  }
  out
}

fn normalize_span(span: &WireSpan, project_id: Option<String>) -> NormalizedSpan {
  let start_time_nanos = parse_nanos(span.start_time_unix_nano.as_ref());
  // Clamp so the derived duration is never negative.
  let end_time_nanos = parse_nanos(span.end_time_unix_nano.as_ref()).max(start_time_nanos);

  NormalizedSpan {
    trace_id: non_empty(span.trace_id.as_deref()),
    span_id: non_empty(span.span_id.as_deref()),
    parent_span_id: non_empty(span.parent_span_id.as_deref()),
    name: span.name.clone().unwrap_or_default(),
    start_time_nanos,
    end_time_nanos,
    status_code: span
      .status
      .as_ref()
      .map(|s| parse_status(s.code.as_ref()))
      .unwrap_or_default(),
    attributes: normalize_attributes(&span.attributes),
    events: span
      .events
      .iter()
      .map(|e| SpanEvent {
        name: e.name.clone().unwrap_or_default(),
        attributes: normalize_attributes(&e.attributes),
      })
      .collect(),
    project_id,
  }
}

fn normalize_log(record: &WireLogRecord, project_id: Option<String>) -> NormalizedLog {
  NormalizedLog {
    time_nanos: parse_nanos(record.time_unix_nano.as_ref()),
    severity_number: record
      .severity_number
      .as_ref()
      .and_then(value_as_i64)
      .and_then(|n| i32::try_from(n).ok())
      .unwrap_or(0),
    severity_text: record.severity_text.clone(),
    body: record.body.as_ref().and_then(any_value).map(|v| v.to_string()),
    attributes: normalize_attributes(&record.attributes),
    trace_id: non_empty(record.trace_id.as_deref()),
    span_id: non_empty(record.span_id.as_deref()),
    project_id,
  }
}

/// Last present of `service.name`, `service.namespace`, `project.id`.
fn project_id(resource: &WireResource) -> Option<String> {
  let attrs = normalize_attributes(&resource.attributes);
  PROJECT_KEYS
    .iter()
    .filter_map(|key| attrs.get(*key))
    .map(|v| v.to_string())
    .filter(|v| !v.is_empty())
    .last()
}

/// Convert an OTLP KeyValue list into a map. Later duplicates win; valueless keys are dropped.
pub fn normalize_attributes(kvs: &[WireKeyValue]) -> Attributes {
  kvs
    .iter()
    .filter_map(|kv| {
      let value = kv.value.as_ref().and_then(any_value)?;
      Some((kv.key.clone(), value))
    })
    .collect()
}

fn any_value(v: &WireAnyValue) -> Option<AttrValue> {
  if let Some(s) = &v.string_value {
    return Some(AttrValue::Str(s.clone()));
  }
  if let Some(n) = v.int_value.as_ref().and_then(value_as_i64) {
    return Some(AttrValue::Int(n));
  }
  if let Some(b) = v.bool_value {
    return Some(AttrValue::Bool(b));
  }
  v.double_value.as_ref().and_then(value_as_f64).map(AttrValue::Double)
}

/// Doubles arrive as numbers or, for non-finite values, as proto3 JSON strings.
fn value_as_f64(v: &Value) -> Option<f64> {
  match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => match s.trim() {
      "NaN" => Some(f64::NAN),
      "Infinity" => Some(f64::INFINITY),
      "-Infinity" => Some(f64::NEG_INFINITY),
      other => other.parse().ok(),
    },
    _ => None,
  }
}

/// OTLP int64 fields arrive as JSON strings or numbers.
fn value_as_i64(v: &Value) -> Option<i64> {
  match v {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn parse_nanos(v: Option<&Value>) -> u64 {
  match v {
    Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
    Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
    _ => 0,
  }
}

fn parse_status(code: Option<&Value>) -> StatusCode {
  match code {
    Some(Value::Number(n)) => match n.as_i64() {
      Some(1) => StatusCode::Ok,
      Some(2) => StatusCode::Error,
      _ => StatusCode::Unset,
    },
    Some(Value::String(s)) => match s.trim() {
      "STATUS_CODE_OK" | "OK" | "1" => StatusCode::Ok,
      "STATUS_CODE_ERROR" | "ERROR" | "2" => StatusCode::Error,
      _ => StatusCode::Unset,
    },
    _ => StatusCode::Unset,
  }
}

fn non_empty(s: Option<&str>) -> Option<String> {
  s.filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn traces(v: Value) -> ExportTraceRequest {
    serde_json::from_value(v).unwrap()
  }

  fn logs(v: Value) -> ExportLogsRequest {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn missing_top_level_array_is_a_no_op() {
    assert!(normalize_traces(&traces(json!({}))).is_empty());
    assert!(normalize_logs(&logs(json!({"unrelated": true}))).is_empty());
  }

  #[test]
  fn span_fields_are_flattened() {
    let req = traces(json!({
      "resourceSpans": [{
        "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "checkout"}}]},
        "scopeSpans": [{"spans": [{
          "traceId": "t1",
          "spanId": "s1",
          "name": "GET /pay",
          "startTimeUnixNano": "1000000000",
          "endTimeUnixNano": 3000000000u64,
          "status": {"code": 2},
          "attributes": [
            {"key": "http.status_code", "value": {"intValue": "503"}},
            {"key": "custom.flag", "value": {"boolValue": true}}
          ],
          "events": [{"name": "exception", "attributes": [
            {"key": "exception.type", "value": {"stringValue": "IOError"}}
          ]}]
        }]}]
      }]
    }));

    let spans = normalize_traces(&req);
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.trace_id.as_deref(), Some("t1"));
    assert_eq!(span.parent_span_id, None);
    assert_eq!(span.status_code, StatusCode::Error);
    assert_eq!(span.duration_nanos(), 2_000_000_000);
    assert_eq!(span.attributes.get("http.status_code"), Some(&AttrValue::Int(503)));
    assert_eq!(span.attributes.get("custom.flag"), Some(&AttrValue::Bool(true)));
    assert_eq!(span.events.len(), 1);
    assert_eq!(span.events[0].name, "exception");
    assert_eq!(span.project_id.as_deref(), Some("checkout"));
  }

  #[test]
  fn missing_optional_span_fields_default() {
    let spans = normalize_traces(&traces(json!({
      "resourceSpans": [{"scopeSpans": [{"spans": [{}]}]}]
    })));
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status_code, StatusCode::Unset);
    assert_eq!(spans[0].name, "");
    assert!(spans[0].events.is_empty());
    assert_eq!(spans[0].project_id, None);
  }

  #[test]
  fn end_before_start_is_clamped() {
    let spans = normalize_traces(&traces(json!({
      "resourceSpans": [{"scopeSpans": [{"spans": [{
        "startTimeUnixNano": "5000", "endTimeUnixNano": "1000"
      }]}]}]
    })));
    assert_eq!(spans[0].duration_nanos(), 0);
  }

  #[test]
  fn status_code_names_are_accepted() {
    assert_eq!(parse_status(Some(&json!("STATUS_CODE_ERROR"))), StatusCode::Error);
    assert_eq!(parse_status(Some(&json!("STATUS_CODE_OK"))), StatusCode::Ok);
    assert_eq!(parse_status(Some(&json!(7))), StatusCode::Unset);
    assert_eq!(parse_status(None), StatusCode::Unset);
  }

  #[test]
  fn project_id_wins_over_service_name() {
    let req = logs(json!({
      "resourceLogs": [{
        "resource": {"attributes": [
          {"key": "project.id", "value": {"stringValue": "proj-42"}},
          {"key": "service.name", "value": {"stringValue": "api"}},
          {"key": "service.namespace", "value": {"stringValue": "shop"}}
        ]},
        "scopeLogs": [{"logRecords": [{"severityNumber": 17, "body": {"stringValue": "boom"}}]}]
      }]
    }));
    let records = normalize_logs(&req);
    assert_eq!(records[0].project_id.as_deref(), Some("proj-42"));
  }

  #[test]
  fn log_fields_are_flattened() {
    let req = logs(json!({
      "resourceLogs": [{"scopeLogs": [{"logRecords": [
        {"severityNumber": "21", "body": {"stringValue": "fatal"}, "traceId": "t9"},
        {"body": {"intValue": 42}},
        {"severityNumber": "loud"}
      ]}]}]
    }));
    let records = normalize_logs(&req);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].severity_number, 21);
    assert_eq!(records[0].body.as_deref(), Some("fatal"));
    assert_eq!(records[0].trace_id.as_deref(), Some("t9"));
    assert_eq!(records[1].body.as_deref(), Some("42"));
    assert_eq!(records[1].severity_number, 0);
    assert_eq!(records[2].severity_number, 0);
    assert_eq!(records[2].body, None);
  }

  #[test]
  fn explicit_nulls_are_treated_as_missing() {
    assert!(normalize_traces(&traces(json!({"resourceSpans": null}))).is_empty());
    assert!(normalize_traces(&traces(json!({"resourceSpans": [{"scopeSpans": null}]}))).is_empty());
    assert!(normalize_traces(&traces(json!({"resourceSpans": [{"scopeSpans": [{"spans": null}]}]}))).is_empty());
    assert!(normalize_logs(&logs(json!({"resourceLogs": null}))).is_empty());
    assert!(normalize_logs(&logs(json!({"resourceLogs": [{"scopeLogs": [{"logRecords": null}]}]}))).is_empty());
  }

  #[test]
  fn error_span_with_null_lists_still_fires() {
    let req = traces(json!({
      "resourceSpans": [{
        "resource": {"attributes": null},
        "scopeSpans": [{"spans": [{
          "traceId": "t1",
          "name": "GET /cart",
          "status": {"code": 2},
          "attributes": [
            {"key": "http.status_code", "value": {"intValue": "500"}},
            {"key": null, "value": {"stringValue": "keyless"}}
          ],
          "events": null
        }]}]
      }]
    }));
    let spans = normalize_traces(&req);
    assert_eq!(spans.len(), 1);
    assert!(spans[0].events.is_empty());
    assert_eq!(spans[0].project_id, None);

    let results = crate::detect::detect_span(&std::sync::Arc::new(spans[0].clone()), 2000);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, DetectionType::HttpError);
  }

  #[test]
  fn double_values_accept_non_finite_strings() {
    let req = traces(json!({
      "resourceSpans": [{"scopeSpans": [{"spans": [{
        "attributes": [
          {"key": "ratio", "value": {"doubleValue": 0.5}},
          {"key": "nan", "value": {"doubleValue": "NaN"}},
          {"key": "inf", "value": {"doubleValue": "-Infinity"}},
          {"key": "junk", "value": {"doubleValue": {"nested": true}}}
        ],
        "events": [{"name": "exception", "attributes": null}]
      }]}]}]
    }));
    let span = &normalize_traces(&req)[0];
    assert_eq!(span.attributes.get("ratio"), Some(&AttrValue::Double(0.5)));
    assert!(matches!(span.attributes.get("nan"), Some(AttrValue::Double(d)) if d.is_nan()));
    assert_eq!(span.attributes.get("inf"), Some(&AttrValue::Double(f64::NEG_INFINITY)));
    assert!(!span.attributes.contains_key("junk"));
    assert!(span.events[0].attributes.is_empty());
  }

  #[test]
  fn order_follows_payload_nesting() {
    let req = traces(json!({
      "resourceSpans": [
        {"scopeSpans": [{"spans": [{"name": "a"}, {"name": "b"}]}, {"spans": [{"name": "c"}]}]},
        {"scopeSpans": [{"spans": [{"name": "d"}]}]}
      ]
    }));
    let names: Vec<_> = normalize_traces(&req).into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
  }
}
