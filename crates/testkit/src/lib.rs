use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use loglens_core::model::log::LogRecord;
use serde_json::{Map, Value, json};

/// JSON-lines body: one trace crossing gateway -> orders -> payments, with the
/// payment span failing.
pub const JSON_LINES: &str = r#"{"timestamp":"2024-01-01T10:00:00Z","level":"INFO","service":"gateway","traceId":"t-100","spanId":"g1","message":"GET /orders received"}
{"timestamp":"2024-01-01T10:00:00.050Z","level":"INFO","service":"orders","traceId":"t-100","spanId":"o1","parentSpanId":"g1","message":"loading order"}
{"timestamp":"2024-01-01T10:00:00.120Z","level":"ERROR","service":"payments","traceId":"t-100","spanId":"p1","parentSpanId":"o1","message":"card declined"}
{"timestamp":"2024-01-01T10:00:00.300Z","level":"INFO","service":"gateway","traceId":"t-100","spanId":"g1","message":"request completed"}
not a json line
{"timestamp":"2024-01-01T10:00:05Z","level":"DEBUG","service":"gateway","message":"health check"}
"#;

/// Text body: one correlated trace with a stack-trace continuation line.
pub const TEXT_LOG: &str = "2024-01-01T11:00:00Z [auth] INFO Starting request traceId=t-200 spanId=a1\n2024-01-01T11:00:00.400Z [auth] ERROR token lookup failed traceId=t-200 spanId=a2 parentSpanId=a1\n  at TokenStore.get(TokenStore.java:42)\n2024-01-01 11:00:01 WARN [auth] slow response\n";

/// XML body with two `<log>` entries of one trace.
pub const XML_LOG: &str = r#"<?xml version="1.0"?>
<logs>
  <log>
    <timestamp>2024-01-01T12:00:00Z</timestamp>
    <level>INFO</level>
    <service>inventory</service>
    <trace_id>t-300</trace_id>
    <span_id>i1</span_id>
    <message>reserve stock</message>
  </log>
  <log>
    <timestamp>2024-01-01T12:00:01Z</timestamp>
    <level>INFO</level>
    <service>inventory</service>
    <trace_id>t-300</trace_id>
    <span_id>i1</span_id>
    <message>reservation successful</message>
  </log>
</logs>
"#;

pub fn write_log_file(dir: &Path, name: &str, body: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, body)?;
    Ok(path)
}

pub fn record(value: Value) -> LogRecord {
    match value {
        Value::Object(fields) => LogRecord::from_fields(fields),
        other => {
            let mut fields = Map::new();
            fields.insert("message".to_string(), other);
            LogRecord::from_fields(fields)
        }
    }
}

pub fn base_time() -> DateTime<FixedOffset> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
        .fixed_offset()
}

/// A correlated span record, as the parse pipeline would leave it.
pub fn span_record(
    trace_id: &str,
    span_id: &str,
    parent: Option<&str>,
    service: &str,
    level: &str,
    offset_ms: i64,
) -> LogRecord {
    let ts = base_time() + Duration::milliseconds(offset_ms);
    let mut r = record(json!({
        "timestamp": ts.to_rfc3339(),
        "level": level,
        "service": service,
        "message": format!("{service} {level} at +{offset_ms}ms"),
    }));
    r.trace_id = Some(trace_id.to_string());
    r.span_id = Some(span_id.to_string());
    r.parent_span_id = parent.map(str::to_string);
    r
}

/// Three spans across services A -> B -> C, two records each.
pub fn chain_trace(trace_id: &str) -> Vec<LogRecord> {
    let mut records = vec![
        span_record(trace_id, "a", None, "A", "INFO", 0),
        span_record(trace_id, "b", Some("a"), "B", "INFO", 10),
        span_record(trace_id, "c", Some("b"), "C", "INFO", 20),
        span_record(trace_id, "c", Some("b"), "C", "INFO", 45),
        span_record(trace_id, "b", Some("a"), "B", "INFO", 60),
        span_record(trace_id, "a", None, "A", "INFO", 100),
    ];
    for (idx, r) in records.iter_mut().enumerate() {
        r.sequence_index = idx;
    }
    records
}

/// Renumbers sequence indexes across concatenated fixtures.
pub fn sequenced(records: impl IntoIterator<Item = LogRecord>) -> Vec<LogRecord> {
    records
        .into_iter()
        .enumerate()
        .map(|(idx, mut r)| {
            r.sequence_index = idx;
            r
        })
        .collect()
}
