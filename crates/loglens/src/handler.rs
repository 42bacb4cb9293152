use loglens_analyze::{AnalysisOptions, Dataset};
use loglens_core::Result;
use loglens_core::config::Config;
use loglens_core::query::ParseResponse;

use crate::protocol::{ApiRequest, ApiResponse};

/// Runs one request to completion. Failures come back in-band.
pub fn handle_request(req: ApiRequest, cfg: &Config) -> ApiResponse {
    dispatch(req, cfg).unwrap_or_else(|e| ApiResponse::Error(e.to_string()))
}

fn dispatch(req: ApiRequest, cfg: &Config) -> Result<ApiResponse> {
    let opts = AnalysisOptions::from_config(cfg);
    match req {
        ApiRequest::Parse(r) => loglens_ingest::run_batch(&r).map(|batch| {
            // Without an output file the records are the result.
            let records = r.output_path.is_none().then_some(batch.records);
            ApiResponse::Parse(ParseResponse {
                summary: batch.summary,
                records,
            })
        }),
        ApiRequest::Analyze(r) => Dataset::open(&r.processed_path)?
            .analyze(&r, &opts)
            .map(ApiResponse::Analyze),
        ApiRequest::Graph(r) => Dataset::open(&r.processed_path)?
            .service_graph(&r, &opts)
            .map(ApiResponse::Graph),
        ApiRequest::Logs(r) => Dataset::open(&r.processed_path)?
            .trace_logs(&r)
            .map(ApiResponse::Logs),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use loglens_core::filter::LogFormat;
    use loglens_core::query::{AnalyzeRequest, ParseRequest};

    use super::*;

    #[test]
    fn parse_then_analyze_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = testkit::write_log_file(dir.path(), "app.jsonl", testkit::JSON_LINES).unwrap();
        let processed = dir.path().join("processed.json");
        let cfg = Config::default();

        let parsed = handle_request(
            ApiRequest::Parse(ParseRequest {
                inputs: vec![input],
                format: LogFormat::Auto,
                output_path: Some(processed.clone()),
                extract_tracing: true,
                time_zone: "UTC".to_string(),
            }),
            &cfg,
        );
        let ApiResponse::Parse(parsed) = parsed else {
            panic!("unexpected response: {parsed:?}");
        };
        assert_eq!(parsed.summary.total_logs, 5);
        assert!(parsed.records.is_none());

        let analyzed = handle_request(
            ApiRequest::Analyze(AnalyzeRequest {
                processed_path: processed,
                trace_id: None,
                max_traces: None,
                output_path: None,
            }),
            &cfg,
        );
        let ApiResponse::Analyze(resp) = analyzed else {
            panic!("unexpected response: {analyzed:?}");
        };
        assert_eq!(resp.traces_analyzed, 1);
        assert!(resp.analyses[0].has_errors);
    }

    #[test]
    fn parse_without_output_returns_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = testkit::write_log_file(dir.path(), "app.jsonl", testkit::JSON_LINES).unwrap();

        let parsed = handle_request(
            ApiRequest::Parse(ParseRequest {
                inputs: vec![input],
                format: LogFormat::Auto,
                output_path: None,
                extract_tracing: true,
                time_zone: "UTC".to_string(),
            }),
            &Config::default(),
        );
        let ApiResponse::Parse(parsed) = parsed else {
            panic!("unexpected response: {parsed:?}");
        };
        let records = parsed.records.expect("records returned inline");
        assert_eq!(records.len(), parsed.summary.total_logs);
        assert_eq!(records[2].span_id.as_deref(), Some("p1"));
        assert!(records[0].trace_structure.is_some());
    }

    #[test]
    fn errors_are_reported_in_band() {
        let resp = handle_request(
            ApiRequest::Analyze(AnalyzeRequest {
                processed_path: PathBuf::from("/definitely/not/here.json"),
                trace_id: None,
                max_traces: None,
                output_path: None,
            }),
            &Config::default(),
        );
        assert!(matches!(resp, ApiResponse::Error(msg) if msg.contains("failed reading")));
    }
}
