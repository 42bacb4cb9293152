mod handler;
mod output;
mod protocol;
mod telemetry;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use loglens_core::config::Config;
use loglens_core::filter::{LogFormat, TimeWindow};
use loglens_core::query::{
    AnalyzeRequest, GraphFormat, GraphRequest, ParseRequest, TraceLogsRequest,
};
use loglens_core::time::parse_time_or_relative;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::handler::handle_request;
use crate::output::{print_analyze_human, print_graph_human, print_logs_human, print_parse_human};
use crate::protocol::{ApiRequest, ApiResponse};
use crate::telemetry::{TelemetryConfig, init_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "loglens")]
#[command(about = "Parse heterogeneous logs, correlate traces and map service interactions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Extract, normalize and correlate log files into one JSON array")]
    Parse {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, help = "auto, json, xml or text")]
        format: Option<String>,
        #[arg(long, help = "IANA zone for normalized timestamps")]
        time_zone: Option<String>,
        #[arg(long, help = "Skip trace/span correlation")]
        no_tracing: bool,
    },
    #[command(about = "Analyze distributed traces in processed output")]
    Analyze {
        processed: PathBuf,
        #[arg(long)]
        trace: Option<String>,
        #[arg(long)]
        max_traces: Option<usize>,
        #[arg(long)]
        min_records: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    #[command(about = "Build the service interaction graph")]
    Graph {
        processed: PathBuf,
        #[arg(long = "trace")]
        traces: Vec<String>,
        #[arg(long, default_value = "mermaid", help = "json, mermaid or dot")]
        format: String,
    },
    #[command(about = "List the records of one trace in time order")]
    Logs {
        processed: PathBuf,
        trace_id: String,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    #[command(about = "Serve the tools as line-delimited JSON-RPC on stdio")]
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::load().context("load config")?;

    match cli.command {
        Commands::Parse {
            inputs,
            output,
            format,
            time_zone,
            no_tracing,
        } => {
            init_tracing(TelemetryConfig::from_env());
            let req = ParseRequest {
                inputs,
                format: match format {
                    Some(f) => LogFormat::from_str(&f)?,
                    None => cfg.log_format,
                },
                output_path: output,
                extract_tracing: cfg.extract_tracing && !no_tracing,
                time_zone: time_zone.unwrap_or_else(|| cfg.time_zone.clone()),
            };
            respond(ApiRequest::Parse(req), &cfg, cli.json)
        }
        Commands::Analyze {
            processed,
            trace,
            max_traces,
            min_records,
            output,
        } => {
            init_tracing(TelemetryConfig::from_env());
            if let Some(v) = min_records {
                cfg.min_trace_records = v;
            }
            let req = AnalyzeRequest {
                processed_path: processed,
                trace_id: trace,
                max_traces,
                output_path: output,
            };
            respond(ApiRequest::Analyze(req), &cfg, cli.json)
        }
        Commands::Graph {
            processed,
            traces,
            format,
        } => {
            init_tracing(TelemetryConfig::from_env());
            let req = GraphRequest {
                processed_path: processed,
                trace_ids: traces,
                format: GraphFormat::from_str(&format)?,
            };
            respond(ApiRequest::Graph(req), &cfg, cli.json)
        }
        Commands::Logs {
            processed,
            trace_id,
            since,
            until,
            limit,
        } => {
            init_tracing(TelemetryConfig::from_env());
            let req = TraceLogsRequest {
                processed_path: processed,
                trace_id,
                window: parse_window(since, until)?,
                limit,
            };
            respond(ApiRequest::Logs(req), &cfg, cli.json)
        }
        Commands::Mcp => {
            init_tracing(TelemetryConfig {
                otlp: true,
                ..TelemetryConfig::from_env()
            });
            let result = run_mcp(cfg).await;
            shutdown_tracing();
            result
        }
    }
}

fn respond(req: ApiRequest, cfg: &Config, json: bool) -> anyhow::Result<()> {
    let response = handle_request(req, cfg);
    let failed = matches!(response, ApiResponse::Error(_));
    print_response(response, cfg, json)?;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn tool_list() -> serde_json::Value {
    serde_json::json!({"tools": [
        {"name": "parse", "description": "Extract, normalize and correlate log files"},
        {"name": "analyze", "description": "Analyze distributed traces in processed output"},
        {"name": "graph", "description": "Merged service interaction graph"},
        {"name": "logs", "description": "Records of one trace in time order"}
    ]})
}

async fn run_mcp(cfg: Config) -> anyhow::Result<()> {
    #[derive(serde::Deserialize)]
    struct McpReq {
        id: Option<serde_json::Value>,
        method: Option<String>,
        params: Option<serde_json::Value>,
    }

    fn mcp_ok(id: Option<serde_json::Value>, result: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"jsonrpc":"2.0","id":id,"result":result})
    }

    fn mcp_err(id: Option<serde_json::Value>, message: String) -> serde_json::Value {
        serde_json::json!({"jsonrpc":"2.0","id":id,"error":{"message":message}})
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let input = match serde_json::from_str::<McpReq>(&line) {
            Ok(v) => v,
            Err(e) => {
                println!("{}", serde_json::to_string(&mcp_err(None, e.to_string()))?);
                continue;
            }
        };

        match input.method.as_deref() {
            Some("initialize") => {
                let result = serde_json::json!({
                    "protocolVersion": "0.1.0",
                    "serverInfo": {"name": "loglens", "version": env!("CARGO_PKG_VERSION")},
                    "capabilities": {
                        "tools": {"listChanged": false}
                    }
                });
                println!("{}", serde_json::to_string(&mcp_ok(input.id, result))?);
                continue;
            }
            Some("tools/list") => {
                println!("{}", serde_json::to_string(&mcp_ok(input.id, tool_list()))?);
                continue;
            }
            Some("tools/call") => {}
            _ => {
                println!(
                    "{}",
                    serde_json::to_string(&mcp_err(
                        input.id,
                        "unsupported method (expected initialize, tools/list, tools/call)"
                            .to_string()
                    ))?
                );
                continue;
            }
        }

        let Some(tool_name) = input
            .params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .map(|s| s.to_string())
        else {
            println!(
                "{}",
                serde_json::to_string(&mcp_err(input.id, "missing tool name".to_string()))?
            );
            continue;
        };

        let method_args = input
            .params
            .as_ref()
            .and_then(|p| p.get("arguments"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let request = match tool_name.as_str() {
            "parse" => serde_json::from_value::<ParseRequest>(method_args).map(ApiRequest::Parse),
            "analyze" => {
                serde_json::from_value::<AnalyzeRequest>(method_args).map(ApiRequest::Analyze)
            }
            "graph" => serde_json::from_value::<GraphRequest>(method_args).map(ApiRequest::Graph),
            "logs" => serde_json::from_value::<TraceLogsRequest>(method_args).map(ApiRequest::Logs),
            _ => {
                println!(
                    "{}",
                    serde_json::to_string(&mcp_err(input.id, "unknown mcp tool".to_string()))?
                );
                continue;
            }
        };

        let response = match request {
            Ok(req) => {
                let cfg = cfg.clone();
                let span = tracing::info_span!("mcp.tool", tool = %tool_name);
                tokio::task::spawn_blocking(move || {
                    let _entered = span.enter();
                    handle_request(req, &cfg)
                })
                .await
                .context("tool task panicked")?
            }
            Err(e) => ApiResponse::Error(format!("invalid tool arguments: {e}")),
        };

        println!(
            "{}",
            serde_json::to_string(&mcp_ok(input.id, serde_json::to_value(response)?))?
        );
    }

    Ok(())
}

fn parse_window(since: Option<String>, until: Option<String>) -> anyhow::Result<TimeWindow> {
    let since = since.map(|v| parse_time_or_relative(&v)).transpose()?;
    let until = until.map(|v| parse_time_or_relative(&v)).transpose()?;
    Ok(TimeWindow { since, until })
}

fn print_response(response: ApiResponse, cfg: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match response {
        ApiResponse::Parse(v) => print_parse_human(&v, cfg.top_services)?,
        ApiResponse::Analyze(v) => print_analyze_human(&v),
        ApiResponse::Graph(v) => print_graph_human(&v),
        ApiResponse::Logs(v) => print_logs_human(&v),
        ApiResponse::Error(e) => eprintln!("error: {e}"),
    }
    Ok(())
}
