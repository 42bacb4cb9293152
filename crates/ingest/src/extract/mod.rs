//! Format-specific extractors. Each turns a file body into records carrying
//! only free-form fields; provenance and correlation are filled in later.

pub mod json;
pub mod text;
pub mod xml;

use loglens_core::filter::LogFormat;
use loglens_core::model::log::LogRecord;

pub use json::parse_json_lines;
pub use text::{TextParser, parse_text};
pub use xml::parse_xml;

/// Records pulled from one file body, and how many lines or fragments
/// yielded nothing.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<LogRecord>,
    pub skipped: usize,
}

impl Extraction {
    /// Input was present but none of it could be read as a record.
    pub fn is_unparseable(&self) -> bool {
        self.records.is_empty() && self.skipped > 0
    }
}

/// Dispatches on a resolved format. `Auto` falls back to text.
pub fn extract(content: &str, format: LogFormat) -> Extraction {
    match format {
        LogFormat::Json => parse_json_lines(content),
        LogFormat::Xml => parse_xml(content),
        LogFormat::Text | LogFormat::Auto => parse_text(content),
    }
}
