use chrono::{DateTime, FixedOffset};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::trace::TraceStructure;
use crate::time::parse_timestamp;

/// Field names probed, in order, for a record's timestamp.
pub const TIMESTAMP_FIELDS: [&str; 4] = ["timestamp", "time", "date", "@timestamp"];

pub const TRACE_ID_KEY: &str = "traceId";
pub const SPAN_ID_KEY: &str = "spanId";
pub const PARENT_SPAN_ID_KEY: &str = "parentSpanId";
pub const TRACE_STRUCTURE_KEY: &str = "_trace_structure";
pub const SOURCE_FILE_KEY: &str = "_source_file";
pub const SEQUENCE_INDEX_KEY: &str = "_trace_index";

/// One ingested log entry.
///
/// Serializes as a single flat JSON object: the free-form `fields` first, in
/// ingestion order, followed by the injected correlation and provenance keys.
/// A free-form field whose name collides with a populated injected key is
/// shadowed by the injected value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "traceId", default, deserialize_with = "lenient_id")]
    pub trace_id: Option<String>,
    #[serde(rename = "spanId", default, deserialize_with = "lenient_id")]
    pub span_id: Option<String>,
    #[serde(rename = "parentSpanId", default, deserialize_with = "lenient_id")]
    pub parent_span_id: Option<String>,
    #[serde(rename = "_trace_structure", default)]
    pub trace_structure: Option<TraceStructure>,
    #[serde(rename = "_source_file", default)]
    pub source_file: String,
    #[serde(rename = "_trace_index", default)]
    pub sequence_index: usize,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn service(&self) -> Option<&str> {
        self.field_str("service").filter(|s| !s.is_empty())
    }

    pub fn level(&self) -> Option<&str> {
        self.field_str("level").filter(|s| !s.is_empty())
    }

    pub fn message(&self) -> Option<&str> {
        self.field_str("message")
    }

    /// The first non-empty candidate timestamp field, as stored.
    pub fn timestamp_raw(&self) -> Option<&str> {
        TIMESTAMP_FIELDS
            .iter()
            .find_map(|key| self.field_str(key).filter(|s| !s.is_empty()))
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.timestamp_raw().and_then(parse_timestamp)
    }

    fn shadows(&self, key: &str) -> bool {
        match key {
            TRACE_ID_KEY => self.trace_id.is_some(),
            SPAN_ID_KEY => self.span_id.is_some(),
            PARENT_SPAN_ID_KEY => self.parent_span_id.is_some(),
            TRACE_STRUCTURE_KEY => self.trace_structure.is_some(),
            SOURCE_FILE_KEY | SEQUENCE_INDEX_KEY => true,
            _ => false,
        }
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            if !self.shadows(key) {
                map.serialize_entry(key, value)?;
            }
        }
        if let Some(v) = &self.trace_id {
            map.serialize_entry(TRACE_ID_KEY, v)?;
        }
        if let Some(v) = &self.span_id {
            map.serialize_entry(SPAN_ID_KEY, v)?;
        }
        if let Some(v) = &self.parent_span_id {
            map.serialize_entry(PARENT_SPAN_ID_KEY, v)?;
        }
        if let Some(v) = &self.trace_structure {
            map.serialize_entry(TRACE_STRUCTURE_KEY, v)?;
        }
        map.serialize_entry(SOURCE_FILE_KEY, &self.source_file)?;
        map.serialize_entry(SEQUENCE_INDEX_KEY, &self.sequence_index)?;
        map.end()
    }
}

// Identifiers written by other tools are sometimes numeric.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> LogRecord {
        let Value::Object(fields) = value else {
            panic!("fixture must be an object");
        };
        LogRecord::from_fields(fields)
    }

    #[test]
    fn serializes_flat_with_injected_keys_last() {
        let mut rec = record(json!({"service": "auth", "message": "hi"}));
        rec.trace_id = Some("t1".into());
        rec.source_file = "app.log".into();
        rec.sequence_index = 4;

        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            out,
            json!({
                "service": "auth",
                "message": "hi",
                "traceId": "t1",
                "_source_file": "app.log",
                "_trace_index": 4
            })
        );
        let keys = out.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys[0], "service");
    }

    #[test]
    fn populated_slot_shadows_raw_field() {
        let mut rec = record(json!({"traceId": "raw", "spanId": "kept"}));
        rec.trace_id = Some("correlated".into());

        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["traceId"], "correlated");
        assert_eq!(out["spanId"], "kept");
    }

    #[test]
    fn deserializes_processed_output() {
        let raw = json!({
            "level": "ERROR",
            "timestamp": "2024-01-01T10:00:00+00:00",
            "traceId": 42,
            "spanId": "s1",
            "_source_file": "a.json",
            "_trace_index": 7
        });
        let rec: LogRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(rec.trace_id.as_deref(), Some("42"));
        assert_eq!(rec.span_id.as_deref(), Some("s1"));
        assert_eq!(rec.sequence_index, 7);
        assert_eq!(rec.level(), Some("ERROR"));
        assert!(!rec.fields.contains_key("spanId"));
        assert!(rec.timestamp().is_some());
    }

    #[test]
    fn timestamp_uses_first_present_candidate() {
        let rec = record(json!({"time": "", "date": "2024-01-02 00:00:00", "@timestamp": "x"}));
        assert_eq!(rec.timestamp_raw(), Some("2024-01-02 00:00:00"));
    }
}
