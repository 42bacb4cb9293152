use std::collections::BTreeMap;
use std::io::{self, Write};

use loglens_core::filter::is_error_level;
use loglens_core::model::span::SpanStatus;
use loglens_core::query::{
    AnalyzeResponse, GraphResponse, ParseResponse, ParseSummary, SpanSummary, TraceAnalysis,
    TraceLogsResponse,
};
use owo_colors::OwoColorize;

/// With records inline the JSON array goes to stdout and the summary to
/// stderr, so the array can be piped on.
pub fn print_parse_human(v: &ParseResponse, top_services: usize) -> anyhow::Result<()> {
    match &v.records {
        Some(records) => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, records)?;
            writeln!(stdout)?;
            write_parse_summary(&mut io::stderr().lock(), &v.summary, top_services)?;
        }
        None => write_parse_summary(&mut io::stdout().lock(), &v.summary, top_services)?,
    }
    Ok(())
}

fn write_parse_summary(
    out: &mut impl Write,
    v: &ParseSummary,
    top_services: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "records={} files={} failed={} skipped={}",
        v.total_logs, v.processed_files, v.failed_files, v.skipped_entries
    )?;
    for failure in &v.failures {
        writeln!(out, "  {} {}: {}", "failed".red(), failure.path, failure.reason)?;
    }
    if let Some(path) = &v.output_path {
        writeln!(out, "output={path}")?;
    }

    if !v.level_counts.is_empty() {
        writeln!(out, "levels:")?;
        for (level, count) in &v.level_counts {
            writeln!(out, "  {} {count}", level_label(level))?;
        }
    }

    if !v.service_counts.is_empty() {
        let mut services: Vec<(&String, &usize)> = v.service_counts.iter().collect();
        services.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        writeln!(out, "services:")?;
        for (service, count) in services.iter().take(top_services) {
            writeln!(out, "  {} {count}", service.cyan())?;
        }
        if services.len() > top_services {
            writeln!(out, "  ... and {} more", services.len() - top_services)?;
        }
    }

    if let Some(t) = &v.tracing {
        let avg = t
            .avg_logs_per_trace
            .map_or_else(|| "-".to_string(), |a| format!("{a:.1}"));
        writeln!(
            out,
            "tracing: traces={} traced_logs={} avg_logs_per_trace={avg}",
            t.unique_traces, t.logs_with_trace_info
        )?;
    }
    Ok(())
}

pub fn print_analyze_human(v: &AnalyzeResponse) {
    for analysis in &v.analyses {
        print_trace_analysis(analysis);
        println!();
    }
    if let Some(path) = &v.output_path {
        println!("output={path}");
    }
    println!("-- {} traces analyzed --", v.traces_analyzed);
}

fn print_trace_analysis(t: &TraceAnalysis) {
    let errors = if t.has_errors {
        format!("errors={}", t.error_spans.len()).red().to_string()
    } else {
        "errors=0".to_string()
    };
    println!(
        "TRACE {} duration={} spans={} logs={} {}",
        t.trace_id,
        duration_label(t.duration_ms),
        t.span_count,
        t.log_count,
        errors
    );
    println!("services={}", t.services.join(","));

    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (span_id, span) in &t.spans {
        if let Some(parent) = span.parent_span.as_deref() {
            if t.spans.contains_key(parent) && parent != span_id {
                children.entry(parent).or_default().push(span_id);
            }
        }
    }
    for root in &t.root_spans {
        print_span_node(root, t, &children, 0);
    }
    for edge in t.service_graph.edge_list() {
        println!("  {} -> {} x{}", edge.source, edge.target, edge.weight);
    }
}

fn print_span_node(
    span_id: &str,
    t: &TraceAnalysis,
    children: &BTreeMap<&str, Vec<&str>>,
    depth: usize,
) {
    let Some(span) = t.spans.get(span_id) else {
        return;
    };
    // Bounded by span count so a parent cycle cannot recurse forever.
    if depth > t.spans.len() {
        return;
    }
    print_span_line(span_id, span, depth);
    if let Some(kids) = children.get(span_id) {
        for child in kids {
            print_span_node(child, t, children, depth + 1);
        }
    }
}

fn print_span_line(span_id: &str, span: &SpanSummary, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    println!(
        "{indent}{} {} ({}) {} logs={}",
        span.service.as_deref().unwrap_or("-").cyan(),
        span_id,
        duration_label(span.duration_ms),
        status_label(span.status),
        span.log_count
    );
    for sample in &span.sample_logs {
        println!(
            "{indent}  {} {} | {}",
            sample.timestamp.as_deref().unwrap_or("-"),
            sample.level.as_deref().map_or_else(|| "-".to_string(), level_label),
            sample.message
        );
    }
}

pub fn print_graph_human(v: &GraphResponse) {
    print!("{}", v.rendered);
    if !v.rendered.ends_with('\n') {
        println!();
    }
    eprintln!(
        "-- {} services, {} edges from {} traces --",
        v.graph.nodes.len(),
        v.graph.edge_count(),
        v.traces
    );
}

pub fn print_logs_human(v: &TraceLogsResponse) {
    for record in &v.records {
        let span = record.span_id.as_deref().unwrap_or("-");
        println!(
            "{} {} {} span={} | {}",
            record.timestamp_raw().unwrap_or("-"),
            record.service().unwrap_or("-").cyan(),
            record.level().map_or_else(|| "-".to_string(), level_label),
            span,
            record.message().unwrap_or_default()
        );
    }
    println!("-- {} records ({} returned) --", v.total, v.returned);
}

fn duration_label(ms: Option<i64>) -> String {
    ms.map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"))
}

fn status_label(status: SpanStatus) -> String {
    match status {
        SpanStatus::Error => status.as_str().red().to_string(),
        SpanStatus::Success => status.as_str().green().to_string(),
        SpanStatus::Unknown => status.as_str().bright_black().to_string(),
    }
}

fn level_label(level: &str) -> String {
    if is_error_level(level) {
        return level.red().to_string();
    }
    match level.to_ascii_uppercase().as_str() {
        "WARN" | "WARNING" => level.yellow().to_string(),
        "INFO" => level.green().to_string(),
        "DEBUG" => level.bright_black().to_string(),
        "TRACE" => level.blue().to_string(),
        _ => level.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_caps_services_and_reports_skipped() {
        let summary = ParseSummary {
            total_logs: 6,
            processed_files: 2,
            skipped_entries: 4,
            service_counts: [("a", 3), ("b", 2), ("c", 1)]
                .into_iter()
                .map(|(s, n)| (s.to_string(), n))
                .collect(),
            ..ParseSummary::default()
        };
        let mut out = Vec::new();
        write_parse_summary(&mut out, &summary, 2).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("records=6 files=2 failed=0 skipped=4\n"));
        assert!(text.contains("... and 1 more"));
        assert!(!text.contains("tracing:"));
    }
}
