//! Trace/span identifier discovery and per-trace structure annotation.

use std::collections::{BTreeMap, HashMap};

use loglens_core::ids::{FIELD_RULES, FieldRule, IdSlot, MESSAGE_FIELD, scan_text};
use loglens_core::model::log::LogRecord;
use loglens_core::model::trace::TraceStructure;
use serde_json::{Map, Value};

/// Fills each record's trace, span and parent span ids, then attaches the
/// structure of its trace to every record that has one. Returns the number
/// of distinct traces.
pub fn correlate(records: &mut [LogRecord]) -> usize {
    for record in records.iter_mut() {
        discover_ids(record);
    }
    annotate_structures(records)
}

pub fn discover_ids(record: &mut LogRecord) {
    for slot in IdSlot::ALL {
        if slot_value(record, slot).is_some() {
            continue;
        }
        let found = FIELD_RULES
            .iter()
            .filter(|rule| rule.slot == slot)
            .find_map(|rule| field_match(&record.fields, rule))
            .or_else(|| message_match(&record.fields, slot));
        if let Some(id) = found {
            *slot_mut(record, slot) = Some(id);
        }
    }
}

fn slot_value(record: &LogRecord, slot: IdSlot) -> Option<&String> {
    match slot {
        IdSlot::Trace => record.trace_id.as_ref(),
        IdSlot::Span => record.span_id.as_ref(),
        IdSlot::ParentSpan => record.parent_span_id.as_ref(),
    }
}

fn slot_mut(record: &mut LogRecord, slot: IdSlot) -> &mut Option<String> {
    match slot {
        IdSlot::Trace => &mut record.trace_id,
        IdSlot::Span => &mut record.span_id,
        IdSlot::ParentSpan => &mut record.parent_span_id,
    }
}

/// First id-like field whose key is an alias, else the first whose key
/// matches the rule's token.
fn field_match(fields: &Map<String, Value>, rule: &FieldRule) -> Option<String> {
    let candidates = || {
        fields
            .iter()
            .filter_map(|(key, value)| id_text(value).map(|id| (key.to_ascii_lowercase(), id)))
    };
    candidates()
        .find(|(key, _)| rule.exact(key))
        .or_else(|| candidates().find(|(key, _)| rule.fuzzy(key)))
        .map(|(_, id)| id)
}

/// Non-empty strings and numbers are ids, the same values a processed file
/// accepts when it is read back.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn message_match(fields: &Map<String, Value>, slot: IdSlot) -> Option<String> {
    fields
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(MESSAGE_FIELD))
        .find_map(|(_, value)| value.as_str().and_then(|text| scan_text(slot, text)))
}

#[derive(Default)]
struct TraceIndex {
    members: Vec<usize>,
    span_order: Vec<String>,
    parents: HashMap<String, Option<String>>,
}

impl TraceIndex {
    fn observe(&mut self, span_id: &str, parent: Option<&String>) {
        match self.parents.get_mut(span_id) {
            None => {
                self.span_order.push(span_id.to_string());
                self.parents.insert(span_id.to_string(), parent.cloned());
            }
            Some(existing) => {
                if existing.is_none() {
                    *existing = parent.cloned();
                }
            }
        }
    }

    fn structure(&self, trace_id: &str) -> TraceStructure {
        let mut root_spans = Vec::new();
        let mut span_hierarchy: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for span_id in &self.span_order {
            match self.parents.get(span_id).and_then(Option::as_ref) {
                Some(parent) if self.parents.contains_key(parent) => span_hierarchy
                    .entry(parent.clone())
                    .or_default()
                    .push(span_id.clone()),
                _ => root_spans.push(span_id.clone()),
            }
        }
        TraceStructure {
            trace_id: trace_id.to_string(),
            root_spans,
            span_hierarchy,
            total_spans: self.span_order.len(),
            total_logs: self.members.len(),
        }
    }
}

fn annotate_structures(records: &mut [LogRecord]) -> usize {
    let mut order: Vec<String> = Vec::new();
    let mut traces: HashMap<String, TraceIndex> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let Some(trace_id) = &record.trace_id else {
            continue;
        };
        let index = traces.entry(trace_id.clone()).or_insert_with(|| {
            order.push(trace_id.clone());
            TraceIndex::default()
        });
        index.members.push(idx);
        if let Some(span_id) = &record.span_id {
            index.observe(span_id, record.parent_span_id.as_ref());
        }
    }

    for trace_id in &order {
        let index = &traces[trace_id];
        let structure = index.structure(trace_id);
        for &idx in &index.members {
            records[idx].trace_structure = Some(structure.clone());
        }
    }
    order.len()
}
