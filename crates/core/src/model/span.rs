use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::filter::is_error_level;
use crate::model::log::LogRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    #[default]
    Unknown,
    Success,
    Error,
}

fn error_message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)exception|error|fail|timeout").expect("valid error regex"))
}

fn success_message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)success|successful|completed").expect("valid success regex")
    })
}

impl SpanStatus {
    /// Status signalled by a single record: an error level, then an error
    /// word in the message, then a success word.
    pub fn classify(level: Option<&str>, message: Option<&str>) -> Self {
        if level.is_some_and(is_error_level) {
            return Self::Error;
        }
        let message = message.unwrap_or_default();
        if error_message_re().is_match(message) {
            Self::Error
        } else if success_message_re().is_match(message) {
            Self::Success
        } else {
            Self::Unknown
        }
    }

    /// Folds another observation in. Error is sticky; success only replaces
    /// unknown.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Error, _) | (_, Self::Error) => Self::Error,
            (Self::Success, _) | (_, Self::Success) => Self::Success,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// An execution unit within one trace, owning the records that carry its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Span {
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service: Option<String>,
    pub records: Vec<LogRecord>,
    pub start_ts: Option<DateTime<FixedOffset>>,
    pub end_ts: Option<DateTime<FixedOffset>>,
    pub timestamp_count: usize,
    pub status: SpanStatus,
}

impl Span {
    pub fn new(span_id: impl Into<String>) -> Self {
        Self {
            span_id: span_id.into(),
            parent_span_id: None,
            service: None,
            records: Vec::new(),
            start_ts: None,
            end_ts: None,
            timestamp_count: 0,
            status: SpanStatus::Unknown,
        }
    }

    /// Folds a record into the span. Parent and service keep the first
    /// non-empty value seen.
    pub fn absorb(&mut self, record: LogRecord) {
        if self.parent_span_id.is_none() {
            self.parent_span_id = record.parent_span_id.clone();
        }
        if self.service.is_none() {
            self.service = record.service().map(str::to_string);
        }
        if let Some(ts) = record.timestamp() {
            self.timestamp_count += 1;
            self.start_ts = Some(self.start_ts.map_or(ts, |s| s.min(ts)));
            self.end_ts = Some(self.end_ts.map_or(ts, |e| e.max(ts)));
        }
        self.status = self
            .status
            .merge(SpanStatus::classify(record.level(), record.message()));
        self.records.push(record);
    }

    /// Milliseconds between the earliest and latest record; needs at least
    /// two parsed timestamps.
    pub fn duration_ms(&self) -> Option<i64> {
        if self.timestamp_count < 2 {
            return None;
        }
        match (self.start_ts, self.end_ts) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0)),
            _ => None,
        }
    }
}
