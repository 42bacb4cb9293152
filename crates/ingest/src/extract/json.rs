use loglens_core::model::log::LogRecord;
use serde_json::Value;
use tracing::debug;

use super::Extraction;

/// One record per line holding a JSON object. Blank lines, malformed JSON and
/// non-object values are skipped.
pub fn parse_json_lines(content: &str) -> Extraction {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(fields)) => records.push(LogRecord::from_fields(fields)),
            Ok(_) | Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped non-object json lines");
    }
    Extraction { records, skipped }
}
