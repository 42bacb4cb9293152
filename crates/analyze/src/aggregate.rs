use std::collections::{BTreeMap, BTreeSet, HashMap};

use loglens_core::model::graph::ServiceGraph;
use loglens_core::model::log::LogRecord;
use loglens_core::model::span::{Span, SpanStatus};
use loglens_core::model::trace::Trace;

/// Records grouped by trace id, groups and members in first-seen order.
/// Records without a trace id are left out.
pub fn group_by_trace(records: &[LogRecord]) -> Vec<(String, Vec<LogRecord>)> {
    let mut groups: Vec<(String, Vec<LogRecord>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let Some(trace_id) = record.trace_id.as_deref() else {
            continue;
        };
        let slot = *index.entry(trace_id).or_insert_with(|| {
            groups.push((trace_id.to_string(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record.clone());
    }
    groups
}

/// Builds every trace holding at least `min_records` records.
pub fn aggregate(records: &[LogRecord], min_records: usize) -> Vec<Trace> {
    group_by_trace(records)
        .into_iter()
        .filter(|(_, members)| members.len() >= min_records)
        .map(|(trace_id, members)| build_trace(&trace_id, members))
        .collect()
}

pub fn build_trace(trace_id: &str, records: Vec<LogRecord>) -> Trace {
    let record_count = records.len();
    let mut spans: BTreeMap<String, Span> = BTreeMap::new();
    let mut span_order: Vec<String> = Vec::new();
    let mut unattributed = Vec::new();

    for record in records {
        match record.span_id.clone() {
            Some(span_id) => spans
                .entry(span_id.clone())
                .or_insert_with(|| {
                    span_order.push(span_id.clone());
                    Span::new(span_id)
                })
                .absorb(record),
            None => unattributed.push(record),
        }
    }

    let root_spans = span_order
        .into_iter()
        .filter(|id| {
            spans[id]
                .parent_span_id
                .as_ref()
                .is_none_or(|parent| !spans.contains_key(parent))
        })
        .collect();

    let services: BTreeSet<String> = spans.values().filter_map(|s| s.service.clone()).collect();
    let has_errors = spans.values().any(|s| s.status == SpanStatus::Error);
    let service_graph = interaction_graph(&spans);

    let start = spans.values().filter_map(|s| s.start_ts).min();
    let end = spans.values().filter_map(|s| s.end_ts).max();
    let duration_ms = match (start, end) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0)),
        _ => None,
    };

    Trace {
        trace_id: trace_id.to_string(),
        spans,
        root_spans,
        services,
        unattributed,
        record_count,
        duration_ms,
        has_errors,
        service_graph,
    }
}

/// Nodes count spans per service; an edge is added for every span whose
/// resolved parent runs in a different service.
fn interaction_graph(spans: &BTreeMap<String, Span>) -> ServiceGraph {
    let mut graph = ServiceGraph::default();
    for span in spans.values() {
        let Some(service) = span.service.as_deref() else {
            continue;
        };
        let node = graph.add_node(service);
        node.spans += 1;
        if span.status == SpanStatus::Error {
            node.error_spans += 1;
        }
    }
    for span in spans.values() {
        let parent_service = span
            .parent_span_id
            .as_deref()
            .and_then(|p| spans.get(p))
            .and_then(|p| p.service.as_deref());
        if let (Some(from), Some(to)) = (parent_service, span.service.as_deref()) {
            if from != to {
                graph.add_edge(from, to, 1);
            }
        }
    }
    graph
}
