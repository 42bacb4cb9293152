use std::cmp::Ordering;

use loglens_core::config::Config;
use loglens_core::model::graph::ServiceGraph;
use loglens_core::model::log::LogRecord;
use loglens_core::model::span::Span;
use loglens_core::model::trace::Trace;
use loglens_core::persist::write_json_pretty;
use loglens_core::query::{
    AnalyzeRequest, AnalyzeResponse, GraphRequest, GraphResponse, SampleLog, SpanSummary,
    TraceAnalysis, TraceLogsRequest, TraceLogsResponse,
};
use loglens_core::{LoglensError, Result};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::render::render_graph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub min_trace_records: usize,
    pub max_traces: usize,
    pub sample_logs_per_span: usize,
    pub message_preview_chars: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AnalysisOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            min_trace_records: cfg.min_trace_records,
            max_traces: cfg.max_traces,
            sample_logs_per_span: cfg.sample_logs_per_span,
            message_preview_chars: cfg.message_preview_chars,
        }
    }
}

impl Dataset {
    pub fn analyze(&self, req: &AnalyzeRequest, opts: &AnalysisOptions) -> Result<AnalyzeResponse> {
        let traces = match &req.trace_id {
            Some(id) => vec![self.trace(id)?],
            None => {
                let max = req.max_traces.unwrap_or(opts.max_traces);
                rank_traces(self.traces(opts.min_trace_records), max)
            }
        };

        let analyses: Vec<TraceAnalysis> =
            traces.iter().map(|t| summarize_trace(t, opts)).collect();
        let mut resp = AnalyzeResponse {
            traces_analyzed: analyses.len(),
            analyses,
            output_path: None,
        };
        if let Some(path) = &req.output_path {
            write_json_pretty(path, &resp)?;
            resp.output_path = Some(path.display().to_string());
        }
        info!(source = self.source(), traces = resp.traces_analyzed, "traces analyzed");
        Ok(resp)
    }

    /// Merges the interaction graphs of the requested traces, or of every
    /// trace large enough to analyze.
    pub fn service_graph(&self, req: &GraphRequest, opts: &AnalysisOptions) -> Result<GraphResponse> {
        let traces = if req.trace_ids.is_empty() {
            self.traces(opts.min_trace_records)
        } else {
            req.trace_ids
                .iter()
                .map(|id| self.trace(id))
                .collect::<Result<Vec<_>>>()?
        };

        let mut graph = ServiceGraph::default();
        for trace in &traces {
            graph.merge(&trace.service_graph);
        }
        let rendered = render_graph(&graph, req.format)?;
        debug!(
            traces = traces.len(),
            services = graph.nodes.len(),
            edges = graph.edge_count(),
            "service graph built"
        );
        Ok(GraphResponse {
            format: req.format,
            traces: traces.len(),
            graph,
            rendered,
        })
    }

    /// A trace's records in time order; records without a usable timestamp
    /// sort last, and ties keep ingestion order.
    pub fn trace_logs(&self, req: &TraceLogsRequest) -> Result<TraceLogsResponse> {
        let mut matched: Vec<(&LogRecord, Option<_>)> = self
            .records()
            .iter()
            .filter(|r| r.trace_id.as_deref() == Some(req.trace_id.as_str()))
            .map(|r| (r, r.timestamp()))
            .collect();
        if matched.is_empty() {
            return Err(LoglensError::Analyze(format!(
                "trace id {} not found",
                req.trace_id
            )));
        }
        if !req.window.is_unbounded() {
            matched.retain(|(_, ts)| ts.as_ref().is_some_and(|t| req.window.contains(t)));
        }

        matched.sort_by(|(a, ta), (b, tb)| {
            let by_time = match (ta, tb) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_time.then(a.sequence_index.cmp(&b.sequence_index))
        });

        let total = matched.len();
        let records: Vec<LogRecord> = matched
            .into_iter()
            .take(req.limit)
            .map(|(r, _)| r.clone())
            .collect();
        Ok(TraceLogsResponse {
            trace_id: req.trace_id.clone(),
            total,
            returned: records.len(),
            records,
        })
    }
}

/// Largest traces first; equal sizes keep first-seen order.
pub fn rank_traces(mut traces: Vec<Trace>, max: usize) -> Vec<Trace> {
    traces.sort_by(|a, b| b.record_count.cmp(&a.record_count));
    traces.truncate(max);
    traces
}

pub fn summarize_trace(trace: &Trace, opts: &AnalysisOptions) -> TraceAnalysis {
    TraceAnalysis {
        trace_id: trace.trace_id.clone(),
        span_count: trace.spans.len(),
        log_count: trace.record_count,
        services: trace.services.iter().cloned().collect(),
        root_spans: trace.root_spans.clone(),
        has_errors: trace.has_errors,
        error_spans: trace.error_spans().into_iter().map(str::to_string).collect(),
        start_ts: trace.start_ts(),
        end_ts: trace.end_ts(),
        duration_ms: trace.duration_ms,
        service_graph: trace.service_graph.clone(),
        spans: trace
            .spans
            .iter()
            .map(|(id, span)| (id.clone(), summarize_span(span, opts)))
            .collect(),
    }
}

fn summarize_span(span: &Span, opts: &AnalysisOptions) -> SpanSummary {
    SpanSummary {
        service: span.service.clone(),
        parent_span: span.parent_span_id.clone(),
        status: span.status,
        start_ts: span.start_ts,
        end_ts: span.end_ts,
        duration_ms: span.duration_ms(),
        log_count: span.records.len(),
        sample_logs: span
            .records
            .iter()
            .take(opts.sample_logs_per_span)
            .map(|r| SampleLog {
                timestamp: r.timestamp_raw().map(str::to_string),
                level: r.level().map(str::to_string),
                message: preview(r.message().unwrap_or_default(), opts.message_preview_chars),
            })
            .collect(),
    }
}

/// Cuts `text` to `max_chars` characters, marking the cut with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
