//! Line-oriented text logs.
//!
//! A line matching one of the header rules opens a record; lines that match
//! none are appended to the open record's message. Rules are tried in order
//! and the first match wins.

use std::sync::OnceLock;

use loglens_core::model::log::{LogRecord, PARENT_SPAN_ID_KEY, SPAN_ID_KEY, TRACE_ID_KEY};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::trace;

use super::Extraction;

const LEVEL_WORDS: &str = "TRACE|DEBUG|INFO|NOTICE|WARN|WARNING|ERROR|SEVERE|FATAL|CRITICAL";

const TRACE_RULE: &str = "trace-ids";

/// Named groups copied into the record when they match non-empty text.
const HEADER_GROUPS: [&str; 5] = ["timestamp", "thread", "logger", "level", "service"];

struct LineRule {
    name: &'static str,
    regex: Regex,
    extract: fn(&Captures<'_>, &str) -> Header,
}

/// Fields taken from a record's first line, plus that line's message part.
struct Header {
    fields: Map<String, Value>,
    message: String,
}

fn rules() -> &'static [LineRule] {
    static RULES: OnceLock<Vec<LineRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            LineRule {
                name: TRACE_RULE,
                regex: Regex::new(
                    r"^.*traceId[=:]\s*(?P<trace>[a-zA-Z0-9-]+).*spanId[=:]\s*(?P<span>[a-zA-Z0-9-]+).*$",
                )
                .expect("valid trace line regex"),
                extract: trace_header,
            },
            LineRule {
                name: "thread-logger",
                regex: Regex::new(
                    r"^(?P<timestamp>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[.,]\d+)?)\s+\[(?P<thread>[^\]]+)\]\s+\[(?P<logger>[^\]]+)\]\s+(?P<level>\w+)\s+(?P<service>\S+)(?:\s+(?P<message>.*))?$",
                )
                .expect("valid thread/logger regex"),
                extract: named_header,
            },
            LineRule {
                name: "iso-header",
                regex: Regex::new(&format!(
                    r"^(?P<timestamp>\d{{4}}-\d{{2}}-\d{{2}}T\d{{2}}:\d{{2}}:\d{{2}}(?:\.\d+)?(?:Z|[+-]\d{{2}}:?\d{{2}})?)(?:\s+|$)(?:\[(?P<service>[^\]]+)\]\s*)?(?:(?P<level>{LEVEL_WORDS})(?:\s+|$))?(?:\[(?P<thread>[^\]]+)\]\s*)?(?P<message>.*)$"
                ))
                .expect("valid iso header regex"),
                extract: named_header,
            },
            LineRule {
                name: "bare-timestamp",
                regex: Regex::new(&format!(
                    r"^(?P<timestamp>\d{{4}}-\d{{2}}-\d{{2}}\s+\d{{2}}:\d{{2}}:\d{{2}}(?:[.,]\d+)?)(?:\s+|$)(?:(?P<level>{LEVEL_WORDS})(?:\s+|$))?(?:\[(?P<service>[^\]]+)\]\s*)?(?P<message>.*)$"
                ))
                .expect("valid bare timestamp regex"),
                extract: named_header,
            },
        ]
    })
}

fn level_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(ERROR|WARN|INFO|DEBUG|TRACE)\b").expect("valid level regex"))
}

fn parent_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"parentSpanId[=:]\s*([a-zA-Z0-9-]+)").expect("valid parent span regex")
    })
}

fn insert_text(fields: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        fields.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// Lines naming both a trace and a span id keep the whole line as message.
/// Header fields come from the first layout rule that also fits the line.
fn trace_header(caps: &Captures<'_>, line: &str) -> Header {
    let mut fields = rules()
        .iter()
        .filter(|rule| rule.name != TRACE_RULE)
        .find_map(|rule| rule.regex.captures(line))
        .map(|layout| named_header(&layout, line).fields)
        .unwrap_or_default();
    if !fields.contains_key("level") {
        if let Some(level) = level_re().captures(line).and_then(|c| c.get(1)) {
            insert_text(&mut fields, "level", level.as_str());
        }
    }
    insert_text(&mut fields, TRACE_ID_KEY, &caps["trace"]);
    insert_text(&mut fields, SPAN_ID_KEY, &caps["span"]);
    if let Some(parent) = parent_span_re().captures(line).and_then(|c| c.get(1)) {
        insert_text(&mut fields, PARENT_SPAN_ID_KEY, parent.as_str());
    }
    Header {
        fields,
        message: line.to_string(),
    }
}

fn named_header(caps: &Captures<'_>, _line: &str) -> Header {
    let mut fields = Map::new();
    for group in HEADER_GROUPS {
        if let Some(m) = caps.name(group) {
            insert_text(&mut fields, group, m.as_str().trim());
        }
    }
    Header {
        fields,
        message: caps
            .name("message")
            .map_or_else(String::new, |m| m.as_str().to_string()),
    }
}

fn match_header(line: &str) -> Option<Header> {
    rules().iter().find_map(|rule| {
        rule.regex.captures(line).map(|caps| {
            trace!(rule = rule.name, "text header matched");
            (rule.extract)(&caps, line)
        })
    })
}

enum State {
    AwaitingRecord,
    Accumulating {
        fields: Map<String, Value>,
        lines: Vec<String>,
    },
}

/// Incremental text parser; feed lines in file order, then `finish`.
pub struct TextParser {
    state: State,
    records: Vec<LogRecord>,
    orphaned: usize,
}

impl Default for TextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TextParser {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingRecord,
            records: Vec::new(),
            orphaned: 0,
        }
    }

    pub fn feed(&mut self, line: &str) {
        let line = line.trim_end();
        if line.trim().is_empty() {
            return;
        }
        if let Some(header) = match_header(line) {
            self.flush();
            self.state = State::Accumulating {
                fields: header.fields,
                lines: vec![header.message],
            };
            return;
        }
        match &mut self.state {
            State::Accumulating { lines, .. } => lines.push(line.to_string()),
            State::AwaitingRecord => self.orphaned += 1,
        }
    }

    /// Flushes the open record. Lines that arrived before any record was
    /// open are reported as skipped.
    pub fn finish(mut self) -> Extraction {
        self.flush();
        if self.orphaned > 0 {
            trace!(lines = self.orphaned, "dropped text lines before first record");
        }
        Extraction {
            records: self.records,
            skipped: self.orphaned,
        }
    }

    fn flush(&mut self) {
        if let State::Accumulating { mut fields, lines } =
            std::mem::replace(&mut self.state, State::AwaitingRecord)
        {
            fields.insert("message".to_string(), Value::String(lines.join("\n")));
            self.records.push(LogRecord::from_fields(fields));
        }
    }
}

pub fn parse_text(content: &str) -> Extraction {
    let mut parser = TextParser::new();
    for line in content.lines() {
        parser.feed(line);
    }
    parser.finish()
}
