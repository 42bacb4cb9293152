use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use loglens_core::filter::LogFormat;
use loglens_core::{LoglensError, Result};

/// Sniffs a file's layout from its first non-blank line. Empty files are
/// treated as text.
pub fn detect_format(path: &Path) -> Result<LogFormat> {
    let file = File::open(path)
        .map_err(|e| LoglensError::Io(format!("failed opening {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| LoglensError::Io(format!("failed reading {}: {e}", path.display())))?;
        if read == 0 {
            return Ok(LogFormat::Text);
        }
        let line = String::from_utf8_lossy(&buf);
        if !line.trim().is_empty() {
            return Ok(classify_line(&line));
        }
    }
}

/// Layout implied by a single non-blank line.
pub fn classify_line(line: &str) -> LogFormat {
    let line = line.trim();
    if line.starts_with('{') && line.ends_with('}') {
        LogFormat::Json
    } else if line.starts_with('<') {
        LogFormat::Xml
    } else {
        LogFormat::Text
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn sniff(body: &str) -> LogFormat {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.log");
        fs::write(&path, body).unwrap();
        detect_format(&path).unwrap()
    }

    #[test]
    fn uses_first_non_blank_line() {
        assert_eq!(sniff("\n\n  {\"level\":\"INFO\"}\nnot json"), LogFormat::Json);
        assert_eq!(sniff("\r\n<?xml version=\"1.0\"?>\n<logs/>"), LogFormat::Xml);
        assert_eq!(sniff("2024-01-01 10:00:00 INFO started\n{}"), LogFormat::Text);
    }

    #[test]
    fn empty_file_is_text() {
        assert_eq!(sniff(""), LogFormat::Text);
        assert_eq!(sniff("\n   \n"), LogFormat::Text);
    }

    #[test]
    fn unterminated_object_is_text() {
        assert_eq!(classify_line("{\"level\": \"INFO\","), LogFormat::Text);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_format(&dir.path().join("absent.log")).is_err());
    }
}
