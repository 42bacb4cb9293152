//! Rule tables for discovering trace and span identifiers in free-form records.
//!
//! Field rules are tried against a record's keys first; message rules only
//! fill slots the field pass left empty. New aliases go into the tables below.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSlot {
    Trace,
    Span,
    ParentSpan,
}

impl IdSlot {
    pub const ALL: [IdSlot; 3] = [IdSlot::Trace, IdSlot::Span, IdSlot::ParentSpan];
}

/// Matches record keys (compared lower-cased) that hold an identifier.
pub struct FieldRule {
    pub slot: IdSlot,
    pub aliases: &'static [&'static str],
    /// Keys containing this token and ending in `id` also match.
    pub token: Option<&'static str>,
    /// Keys containing any of these never match through `token`.
    pub excludes: &'static [&'static str],
}

impl FieldRule {
    pub fn exact(&self, key: &str) -> bool {
        self.aliases.contains(&key)
    }

    pub fn fuzzy(&self, key: &str) -> bool {
        self.token.is_some_and(|t| {
            key.contains(t) && key.ends_with("id") && !self.excludes.iter().any(|x| key.contains(x))
        })
    }
}

pub const FIELD_RULES: [FieldRule; 3] = [
    FieldRule {
        slot: IdSlot::Trace,
        aliases: &["traceid", "trace_id", "trace-id"],
        token: Some("trace"),
        excludes: &["parent"],
    },
    FieldRule {
        slot: IdSlot::Span,
        aliases: &["spanid", "span_id", "span-id"],
        token: Some("span"),
        excludes: &["parent"],
    },
    FieldRule {
        slot: IdSlot::ParentSpan,
        aliases: &[
            "parentspanid",
            "parent_span_id",
            "parent-span-id",
            "parent_id",
            "parentid",
        ],
        token: None,
        excludes: &[],
    },
];

/// Field whose text is scanned when a slot is still empty.
pub const MESSAGE_FIELD: &str = "message";

pub struct MessageRule {
    pub slot: IdSlot,
    pattern: &'static str,
}

const MESSAGE_RULES: [MessageRule; 3] = [
    MessageRule {
        slot: IdSlot::Trace,
        pattern: r#"(?i)\b(?:trace[-_]?id|traceid)\s*[=:,]\s*["']?([a-zA-Z0-9-]+)["']?"#,
    },
    MessageRule {
        slot: IdSlot::Span,
        pattern: r#"(?i)\b(?:span[-_]?id|spanid)\s*[=:,]\s*["']?([a-zA-Z0-9-]+)["']?"#,
    },
    MessageRule {
        slot: IdSlot::ParentSpan,
        pattern: r#"(?i)\b(?:parent[-_]?span[-_]?id|parentspanid)\s*[=:,]\s*["']?([a-zA-Z0-9-]+)["']?"#,
    },
];

pub fn message_rules() -> &'static [(IdSlot, Regex)] {
    static COMPILED: OnceLock<Vec<(IdSlot, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        MESSAGE_RULES
            .iter()
            .map(|r| (r.slot, Regex::new(r.pattern).expect("valid id regex")))
            .collect()
    })
}

/// Identifier for `slot` mentioned in free text, if any.
pub fn scan_text(slot: IdSlot, text: &str) -> Option<String> {
    message_rules()
        .iter()
        .find(|(s, _)| *s == slot)
        .and_then(|(_, re)| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
