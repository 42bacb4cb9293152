use std::fmt::Write;

use loglens_core::model::graph::{ServiceEdge, ServiceGraph, ServiceNode};
use loglens_core::query::GraphFormat;
use loglens_core::{LoglensError, Result};
use serde::Serialize;

#[derive(Serialize)]
struct NodeView<'a> {
    service: &'a str,
    spans: u64,
    error_spans: u64,
}

#[derive(Serialize)]
struct GraphView<'a> {
    nodes: Vec<NodeView<'a>>,
    edges: Vec<ServiceEdge>,
}

pub fn render_graph(graph: &ServiceGraph, format: GraphFormat) -> Result<String> {
    match format {
        GraphFormat::Json => render_json(graph),
        GraphFormat::Mermaid => Ok(render_mermaid(graph)),
        GraphFormat::Dot => Ok(render_dot(graph)),
    }
}

fn render_json(graph: &ServiceGraph) -> Result<String> {
    let view = GraphView {
        nodes: graph
            .nodes
            .iter()
            .map(|(service, node)| NodeView {
                service,
                spans: node.spans,
                error_spans: node.error_spans,
            })
            .collect(),
        edges: graph.edge_list(),
    };
    serde_json::to_string_pretty(&view)
        .map_err(|e| LoglensError::Internal(format!("failed to encode graph: {e}")))
}

fn error_rate(node: &ServiceNode) -> f64 {
    if node.spans == 0 {
        0.0
    } else {
        node.error_spans as f64 * 100.0 / node.spans as f64
    }
}

/// Mermaid flowchart; node ids are positional since service names may hold
/// characters Mermaid rejects.
pub fn render_mermaid(graph: &ServiceGraph) -> String {
    let ids: Vec<&String> = graph.nodes.keys().collect();
    let id_of = |service: &str| {
        ids.iter()
            .position(|s| s.as_str() == service)
            .map_or_else(|| "unknown".to_string(), |i| format!("svc{i}"))
    };

    let mut out = String::from("graph TD\n");
    for (i, (service, node)) in graph.nodes.iter().enumerate() {
        let label = format!(
            "{}<br/>spans: {}, errors: {:.1}%",
            service.replace('"', "#quot;"),
            node.spans,
            error_rate(node)
        );
        let _ = writeln!(out, "    svc{i}[\"{label}\"]");
    }
    for edge in graph.edge_list() {
        let _ = writeln!(
            out,
            "    {} -->|{}| {}",
            id_of(&edge.source),
            edge.weight,
            id_of(&edge.target)
        );
    }
    out
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn dot_quote(s: &str) -> String {
    format!("\"{}\"", dot_escape(s))
}

pub fn render_dot(graph: &ServiceGraph) -> String {
    let mut out = String::from("digraph services {\n    rankdir=LR;\n    node [shape=box];\n");
    for (service, node) in &graph.nodes {
        let _ = writeln!(
            out,
            "    {} [label=\"{}\\nspans: {}, errors: {:.1}%\"];",
            dot_quote(service),
            dot_escape(service),
            node.spans,
            error_rate(node)
        );
    }
    for edge in graph.edge_list() {
        let _ = writeln!(
            out,
            "    {} -> {} [label=\"{}\"];",
            dot_quote(&edge.source),
            dot_quote(&edge.target),
            edge.weight
        );
    }
    out.push_str("}\n");
    out
}
