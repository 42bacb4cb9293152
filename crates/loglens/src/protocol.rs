use loglens_core::query::{
    AnalyzeRequest, AnalyzeResponse, GraphRequest, GraphResponse, ParseRequest, ParseResponse,
    TraceLogsRequest, TraceLogsResponse,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiRequest {
    Parse(ParseRequest),
    Analyze(AnalyzeRequest),
    Graph(GraphRequest),
    Logs(TraceLogsRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResponse {
    Parse(ParseResponse),
    Analyze(AnalyzeResponse),
    Graph(GraphResponse),
    Logs(TraceLogsResponse),
    Error(String),
}
