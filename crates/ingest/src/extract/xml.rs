use std::sync::OnceLock;

use loglens_core::model::log::LogRecord;
use regex::Regex;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::Extraction;

/// Element names treated as one record each, in order of preference.
const ENTRY_TAGS: [&str; 2] = ["log", "event"];

fn log_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<log\b[^>]*>.*?</log\s*>").expect("valid log fragment regex"))
}

fn event_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<event\b[^>]*>.*?</event\s*>").expect("valid event fragment regex")
    })
}

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<\?xml\b").expect("valid xml declaration regex"))
}

/// Parses an XML log file. When the body is not a single well-formed
/// document, `<log>` or `<event>` fragments (or declaration-delimited
/// documents) are parsed one by one and broken fragments are skipped and
/// counted.
pub fn parse_xml(content: &str) -> Extraction {
    match Document::parse(content.trim()) {
        Ok(doc) => Extraction {
            records: records_from_document(&doc),
            skipped: 0,
        },
        Err(err) => {
            debug!(error = %err, "xml body is not one document, parsing fragments");
            parse_fragments(content)
        }
    }
}

fn records_from_document(doc: &Document<'_>) -> Vec<LogRecord> {
    let root = doc.root_element();
    let entries = entry_elements(root);
    if entries.is_empty() {
        return vec![LogRecord::from_fields(flatten(root))];
    }
    entries
        .into_iter()
        .map(|node| LogRecord::from_fields(flatten(node)))
        .collect()
}

fn entry_elements<'a, 'i>(root: Node<'a, 'i>) -> Vec<Node<'a, 'i>> {
    for tag in ENTRY_TAGS {
        let found: Vec<_> = root
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == tag)
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    // No recognised entry tag: any element below the root carrying leaf
    // children is a record.
    root.descendants()
        .skip(1)
        .filter(|n| n.is_element() && bears_leaves(*n))
        .collect()
}

fn bears_leaves(node: Node<'_, '_>) -> bool {
    node.children()
        .any(|c| c.is_element() && !c.children().any(|g| g.is_element()))
}

/// Child tag to trimmed text; children without text map to null.
fn flatten(node: Node<'_, '_>) -> Map<String, Value> {
    let mut fields = Map::new();
    for child in node.children().filter(Node::is_element) {
        let value = child
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or(Value::Null, |t| Value::String(t.to_string()));
        fields.insert(child.tag_name().name().to_string(), value);
    }
    fields
}

fn parse_fragments(content: &str) -> Extraction {
    let mut fragments: Vec<&str> = log_fragment_re()
        .find_iter(content)
        .map(|m| m.as_str())
        .collect();
    if fragments.is_empty() {
        fragments = event_fragment_re()
            .find_iter(content)
            .map(|m| m.as_str())
            .collect();
    }
    if fragments.is_empty() {
        fragments = split_documents(content);
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for fragment in fragments {
        match Document::parse(fragment.trim()) {
            Ok(doc) => records.extend(records_from_document(&doc)),
            Err(err) => {
                skipped += 1;
                debug!(error = %err, "skipping malformed xml fragment");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, parsed = records.len(), "skipped malformed xml fragments");
    }
    Extraction { records, skipped }
}

fn split_documents(content: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = declaration_re().find_iter(content).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            &content[start..end]
        })
        .filter(|doc| !doc.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_elements_become_records() {
        let body = r#"<?xml version="1.0"?>
<logs>
  <log>
    <timestamp>2024-01-01T10:00:00Z</timestamp>
    <level>ERROR</level>
    <service>auth</service>
    <message>  token expired  </message>
    <details/>
  </log>
  <log><level>INFO</level><message>ok</message></log>
</logs>"#;
        let records = parse_xml(body).records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), Some("token expired"));
        assert_eq!(records[0].fields["details"], Value::Null);
        assert_eq!(records[1].level(), Some("INFO"));
    }

    #[test]
    fn event_elements_used_when_no_log_elements() {
        let body = "<events><event><level>WARN</level></event><event><level>INFO</level></event></events>";
        let records = parse_xml(body).records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level(), Some("WARN"));
    }

    #[test]
    fn leaf_bearing_elements_as_fallback() {
        let body = "<batch><entry><level>INFO</level><message>a</message></entry><entry><message>b</message></entry></batch>";
        let records = parse_xml(body).records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message(), Some("b"));
    }

    #[test]
    fn flat_root_is_a_single_record() {
        let records = parse_xml("<root><level>INFO</level><message>solo</message></root>").records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message(), Some("solo"));
    }

    #[test]
    fn concatenated_fragments_skip_broken_ones() {
        let body = "<log><message>first</message></log>\n<log><message>broken</msg></log>\n<log><message>third</message></log>";
        let Extraction { records, skipped } = parse_xml(body);
        let messages: Vec<_> = records.iter().filter_map(|r| r.message()).collect();
        assert_eq!(messages, ["first", "third"]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn nothing_parseable_reports_every_fragment() {
        let extraction = parse_xml("<logs><log><a>broken</b></log></logs>");
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.skipped, 1);
        assert!(extraction.is_unparseable());
    }

    #[test]
    fn splits_on_declarations() {
        let body = "<?xml version=\"1.0\"?><entry><message>one</message></entry>\n<?xml version=\"1.0\"?><entry><message>two</message></entry>";
        let records = parse_xml(body).records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message(), Some("two"));
    }
}
