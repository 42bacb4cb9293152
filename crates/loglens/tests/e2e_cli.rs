use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use testkit::{JSON_LINES, TEXT_LOG, XML_LOG, write_log_file};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_loglens")
}

fn loglens(temp: &Path) -> Command {
    let mut cmd = Command::new(bin());
    cmd.env("LOGLENS_CONFIG", temp.join("no-config.toml"))
        .env_remove("LOGLENS_TIME_ZONE")
        .env_remove("LOGLENS_LOG_FORMAT")
        .env_remove("LOGLENS_MIN_TRACE_RECORDS")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT");
    cmd
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "loglens failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Writes the three fixture formats under `logs/` and parses them into
/// `processed.json`.
fn parse_fixtures(temp: &Path) -> Value {
    let logs = temp.join("logs");
    write_log_file(&logs, "gateway.jsonl", JSON_LINES).unwrap();
    write_log_file(&logs, "auth/auth.log", TEXT_LOG).unwrap();
    write_log_file(&logs, "inventory.xml", XML_LOG).unwrap();

    let output = loglens(temp)
        .arg("--json")
        .arg("parse")
        .arg(&logs)
        .arg(temp.join("missing.log"))
        .arg("-o")
        .arg(temp.join("out/processed.json"))
        .output()
        .unwrap();
    stdout_json(&output)
}

#[test]
fn parse_mixed_directory_reports_summary() {
    let temp = tempfile::tempdir().unwrap();
    let resp = parse_fixtures(temp.path());
    let summary = &resp["Parse"];

    assert_eq!(summary["processed_files"], 3);
    assert_eq!(summary["failed_files"], 1);
    assert_eq!(summary["total_logs"], 5 + 3 + 2);
    assert_eq!(summary["tracing"]["unique_traces"], 3);
    assert_eq!(summary["level_counts"]["ERROR"], 2);

    let processed: Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("out/processed.json")).unwrap(),
    )
    .unwrap();
    let rows = processed.as_array().unwrap();
    assert_eq!(rows.len(), 10);
    for (idx, row) in rows.iter().enumerate() {
        assert_eq!(row["_trace_index"], idx);
        assert!(row["_source_file"].is_string());
    }

    let stack = rows
        .iter()
        .find(|r| r["spanId"] == "a2")
        .expect("text record with continuation");
    assert!(
        stack["message"]
            .as_str()
            .unwrap()
            .ends_with("\n  at TokenStore.get(TokenStore.java:42)")
    );
    assert_eq!(stack["parentSpanId"], "a1");
    assert_eq!(stack["timestamp"], "2024-01-01T11:00:00.400+00:00");

    let xml = rows.iter().find(|r| r["_source_file"] == "inventory.xml").unwrap();
    assert_eq!(xml["traceId"], "t-300");
    assert_eq!(xml["_trace_structure"]["root_spans"][0], "i1");
}

#[test]
fn parse_human_output_converts_time_zone() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_log_file(temp.path(), "app.jsonl", JSON_LINES).unwrap();
    let out_path = temp.path().join("ny.json");

    let output = loglens(temp.path())
        .arg("parse")
        .arg(&file)
        .arg("--time-zone")
        .arg("America/New_York")
        .arg("-o")
        .arg(&out_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("records=5 files=1 failed=0"));
    assert!(stdout.contains("gateway"));
    assert!(stdout.contains("tracing: traces=1"));

    let rows: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(rows[0]["timestamp"], "2024-01-01T05:00:00-05:00");
}

#[test]
fn parse_without_output_prints_records() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_log_file(temp.path(), "app.jsonl", JSON_LINES).unwrap();

    let output = loglens(temp.path()).arg("parse").arg(&file).output().unwrap();
    let rows = stdout_json(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[2]["spanId"], "p1");
    assert_eq!(rows[2]["_trace_structure"]["trace_id"], "t-100");
    assert!(String::from_utf8_lossy(&output.stderr).contains("records=5 files=1 failed=0 skipped=1"));

    let output = loglens(temp.path())
        .arg("--json")
        .arg("parse")
        .arg(&file)
        .output()
        .unwrap();
    let resp = stdout_json(&output);
    assert_eq!(resp["Parse"]["total_logs"], 5);
    assert_eq!(resp["Parse"]["records"].as_array().map(Vec::len), Some(5));
}

#[test]
fn parse_rejects_unknown_time_zone() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_log_file(temp.path(), "app.jsonl", JSON_LINES).unwrap();
    let output = loglens(temp.path())
        .arg("parse")
        .arg(&file)
        .arg("--time-zone")
        .arg("Atlantis/Capital")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown time zone"));
}

#[test]
fn analyze_graph_and_logs_over_processed_output() {
    let temp = tempfile::tempdir().unwrap();
    parse_fixtures(temp.path());
    let processed = temp.path().join("out/processed.json");

    let analyzed = stdout_json(
        &loglens(temp.path())
            .arg("--json")
            .arg("analyze")
            .arg(&processed)
            .output()
            .unwrap(),
    );
    let analyses = analyzed["Analyze"]["analyses"].as_array().unwrap();
    let ids: Vec<&str> = analyses
        .iter()
        .map(|a| a["trace_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["t-100", "t-200", "t-300"]);
    assert_eq!(analyses[0]["has_errors"], true);
    assert_eq!(analyses[0]["error_spans"][0], "p1");
    assert_eq!(analyses[0]["duration_ms"], 300);
    assert_eq!(analyses[2]["spans"]["i1"]["status"], "success");

    let graph = stdout_json(
        &loglens(temp.path())
            .arg("--json")
            .arg("graph")
            .arg(&processed)
            .arg("--format")
            .arg("dot")
            .output()
            .unwrap(),
    );
    let edges = &graph["Graph"]["graph"]["edges"];
    assert_eq!(edges["gateway"]["orders"], 1);
    assert_eq!(edges["orders"]["payments"], 1);
    assert!(
        graph["Graph"]["rendered"]
            .as_str()
            .unwrap()
            .contains("\"gateway\" -> \"orders\"")
    );

    let logs = stdout_json(
        &loglens(temp.path())
            .arg("--json")
            .arg("logs")
            .arg(&processed)
            .arg("t-100")
            .arg("--limit")
            .arg("2")
            .output()
            .unwrap(),
    );
    assert_eq!(logs["Logs"]["total"], 4);
    assert_eq!(logs["Logs"]["returned"], 2);
    assert_eq!(logs["Logs"]["records"][0]["spanId"], "g1");
    assert_eq!(logs["Logs"]["records"][1]["spanId"], "o1");
}

#[test]
fn analyze_unknown_trace_fails() {
    let temp = tempfile::tempdir().unwrap();
    parse_fixtures(temp.path());
    let output = loglens(temp.path())
        .arg("analyze")
        .arg(temp.path().join("out/processed.json"))
        .arg("--trace")
        .arg("nope")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("trace id nope not found"));
}

#[test]
fn graph_mermaid_to_stdout() {
    let temp = tempfile::tempdir().unwrap();
    parse_fixtures(temp.path());
    let output = loglens(temp.path())
        .arg("graph")
        .arg(temp.path().join("out/processed.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("graph TD\n"));
    assert!(stdout.contains("-->|1|"));
}

fn run_mcp(temp: &Path, lines: &[String]) -> Vec<Value> {
    let output = loglens(temp)
        .arg("mcp")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            use std::io::Write;
            let stdin = child.stdin.as_mut().unwrap();
            for line in lines {
                stdin.write_all(line.as_bytes())?;
                stdin.write_all(b"\n")?;
            }
            drop(child.stdin.take());
            child.wait_with_output()
        })
        .unwrap();
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn mcp_initialize_and_tools_list() {
    let temp = tempfile::tempdir().unwrap();
    let replies = run_mcp(
        temp.path(),
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#.to_string(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#.to_string(),
        ],
    );
    assert_eq!(replies.len(), 2);
    assert!(replies[0]["result"]["protocolVersion"].is_string());
    assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 4);
}

#[test]
fn mcp_tool_calls_share_cli_requests() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_log_file(temp.path(), "app.jsonl", JSON_LINES).unwrap();
    let processed = temp.path().join("processed.json");
    let parse = serde_json::json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/call",
        "params": {"name": "parse", "arguments": {"inputs": [file], "output_path": processed}}
    });
    let logs = serde_json::json!({
        "jsonrpc": "2.0", "id": 2, "method": "tools/call",
        "params": {"name": "logs", "arguments": {"processed_path": processed, "trace_id": "t-100"}}
    });
    let bad = serde_json::json!({
        "jsonrpc": "2.0", "id": 3, "method": "tools/call",
        "params": {"name": "analyze", "arguments": {"processed_path": processed, "trace_id": "ghost"}}
    });

    let replies = run_mcp(
        temp.path(),
        &[parse.to_string(), logs.to_string(), bad.to_string()],
    );
    assert_eq!(replies[0]["result"]["Parse"]["total_logs"], 5);
    assert_eq!(replies[1]["result"]["Logs"]["total"], 4);
    assert!(
        replies[2]["result"]["Error"]
            .as_str()
            .unwrap()
            .contains("trace id ghost not found")
    );
}

#[test]
fn mcp_rejects_unknown_method() {
    let temp = tempfile::tempdir().unwrap();
    let replies = run_mcp(
        temp.path(),
        &[r#"{"tool":"parse","args":{}}"#.to_string()],
    );
    assert!(
        replies[0]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("unsupported method")
    );
}
