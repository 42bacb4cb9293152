use std::fs;
use std::path::Path;

use loglens_core::model::log::LogRecord;
use loglens_core::model::trace::Trace;
use loglens_core::{LoglensError, Result};
use tracing::debug;

use crate::aggregate::{aggregate, build_trace, group_by_trace};

/// Processed records loaded back from a parse output file.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<LogRecord>,
    source: String,
}

impl Dataset {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .map_err(|e| LoglensError::Io(format!("failed reading {}: {e}", path.display())))?;
        let records: Vec<LogRecord> = serde_json::from_slice(&raw).map_err(|e| {
            LoglensError::Parse(format!(
                "{} is not a processed log array: {e}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), records = records.len(), "loaded processed logs");
        Ok(Self {
            records,
            source: path.display().to_string(),
        })
    }

    pub fn from_records(records: Vec<LogRecord>) -> Self {
        Self {
            records,
            source: ":memory:".to_string(),
        }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Traces with at least `min_records` records, in first-seen order.
    pub fn traces(&self, min_records: usize) -> Vec<Trace> {
        aggregate(&self.records, min_records)
    }

    /// One trace regardless of its size.
    pub fn trace(&self, trace_id: &str) -> Result<Trace> {
        let members: Vec<LogRecord> = self
            .records
            .iter()
            .filter(|r| r.trace_id.as_deref() == Some(trace_id))
            .cloned()
            .collect();
        if members.is_empty() {
            return Err(LoglensError::Analyze(format!(
                "trace id {trace_id} not found"
            )));
        }
        Ok(build_trace(trace_id, members))
    }

    /// Distinct trace ids in first-seen order with their record counts.
    pub fn trace_ids(&self) -> Vec<(String, usize)> {
        group_by_trace(&self.records)
            .into_iter()
            .map(|(id, records)| (id, records.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_processed_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        let records = testkit::chain_trace("t1");
        loglens_core::persist::write_json_pretty(&path, &records).unwrap();

        let ds = Dataset::open(&path).unwrap();
        assert_eq!(ds.records().len(), 6);
        assert_eq!(ds.records()[2].span_id.as_deref(), Some("c"));
        assert_eq!(ds.records()[1].parent_span_id.as_deref(), Some("a"));
        assert_eq!(ds.trace_ids(), vec![("t1".to_string(), 6)]);
    }

    #[test]
    fn rejects_non_array_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(matches!(Dataset::open(&path), Err(LoglensError::Parse(_))));
        assert!(matches!(
            Dataset::open(&dir.path().join("missing.json")),
            Err(LoglensError::Io(_))
        ));
    }

    #[test]
    fn unknown_trace_is_an_error() {
        let ds = Dataset::from_records(testkit::chain_trace("t1"));
        let err = ds.trace("nope").unwrap_err();
        assert_eq!(err.to_string(), "analysis error: trace id nope not found");
    }
}
