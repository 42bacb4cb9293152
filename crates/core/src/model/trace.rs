use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::model::graph::ServiceGraph;
use crate::model::log::LogRecord;
use crate::model::span::{Span, SpanStatus};

/// Span hierarchy summary attached to every correlated record of a trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TraceStructure {
    pub trace_id: String,
    pub root_spans: Vec<String>,
    pub span_hierarchy: BTreeMap<String, Vec<String>>,
    pub total_spans: usize,
    pub total_logs: usize,
}

/// All spans and records sharing one trace id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub trace_id: String,
    pub spans: BTreeMap<String, Span>,
    /// Spans without a resolvable parent, in first-seen order.
    pub root_spans: Vec<String>,
    pub services: BTreeSet<String>,
    /// Records carrying the trace id but no span id.
    pub unattributed: Vec<LogRecord>,
    pub record_count: usize,
    pub duration_ms: Option<i64>,
    pub has_errors: bool,
    pub service_graph: ServiceGraph,
}

impl Trace {
    pub fn start_ts(&self) -> Option<DateTime<FixedOffset>> {
        self.spans.values().filter_map(|s| s.start_ts).min()
    }

    pub fn end_ts(&self) -> Option<DateTime<FixedOffset>> {
        self.spans.values().filter_map(|s| s.end_ts).max()
    }

    pub fn error_spans(&self) -> Vec<&str> {
        self.spans
            .values()
            .filter(|s| s.status == SpanStatus::Error)
            .map(|s| s.span_id.as_str())
            .collect()
    }

    /// The parent span, when it exists within this trace.
    pub fn parent_of(&self, span: &Span) -> Option<&Span> {
        span.parent_span_id
            .as_deref()
            .and_then(|p| self.spans.get(p))
    }
}
