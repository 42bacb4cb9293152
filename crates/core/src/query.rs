use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{LoglensError, Result};
use crate::filter::{LogFormat, TimeWindow};
use crate::model::graph::ServiceGraph;
use crate::model::log::LogRecord;
use crate::model::span::SpanStatus;

fn default_true() -> bool {
    true
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRequest {
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub extract_tracing: bool,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TracingStats {
    pub unique_traces: usize,
    pub logs_with_trace_info: usize,
    pub avg_logs_per_trace: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParseSummary {
    pub total_logs: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub failures: Vec<FileFailure>,
    /// Lines or XML fragments inside processed files that yielded no record.
    #[serde(default)]
    pub skipped_entries: usize,
    pub output_path: Option<String>,
    pub level_counts: BTreeMap<String, usize>,
    pub service_counts: BTreeMap<String, usize>,
    pub tracing: Option<TracingStats>,
}

/// Result of a parse. Without an output path the normalized records travel
/// back in `records`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    #[serde(flatten)]
    pub summary: ParseSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<LogRecord>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub processed_path: PathBuf,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub max_traces: Option<usize>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleLog {
    pub timestamp: Option<String>,
    pub level: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanSummary {
    pub service: Option<String>,
    pub parent_span: Option<String>,
    pub status: SpanStatus,
    pub start_ts: Option<DateTime<FixedOffset>>,
    pub end_ts: Option<DateTime<FixedOffset>>,
    pub duration_ms: Option<i64>,
    pub log_count: usize,
    pub sample_logs: Vec<SampleLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceAnalysis {
    pub trace_id: String,
    pub span_count: usize,
    pub log_count: usize,
    pub services: Vec<String>,
    pub root_spans: Vec<String>,
    pub has_errors: bool,
    pub error_spans: Vec<String>,
    pub start_ts: Option<DateTime<FixedOffset>>,
    pub end_ts: Option<DateTime<FixedOffset>>,
    pub duration_ms: Option<i64>,
    pub service_graph: ServiceGraph,
    pub spans: BTreeMap<String, SpanSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeResponse {
    pub traces_analyzed: usize,
    pub analyses: Vec<TraceAnalysis>,
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    #[default]
    Json,
    Mermaid,
    Dot,
}

impl FromStr for GraphFormat {
    type Err = LoglensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "mermaid" => Ok(Self::Mermaid),
            "dot" | "graphviz" => Ok(Self::Dot),
            _ => Err(LoglensError::Parse(format!("unknown graph format: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRequest {
    pub processed_path: PathBuf,
    #[serde(default)]
    pub trace_ids: Vec<String>,
    #[serde(default)]
    pub format: GraphFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphResponse {
    pub format: GraphFormat,
    pub traces: usize,
    pub graph: ServiceGraph,
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLogsRequest {
    pub processed_path: PathBuf,
    pub trace_id: String,
    #[serde(default)]
    pub window: TimeWindow,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLogsResponse {
    pub trace_id: String,
    pub total: usize,
    pub returned: usize,
    pub records: Vec<LogRecord>,
}
