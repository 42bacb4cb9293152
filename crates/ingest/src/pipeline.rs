use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use loglens_core::filter::LogFormat;
use loglens_core::model::log::{LogRecord, TIMESTAMP_FIELDS};
use loglens_core::persist::write_json_pretty;
use loglens_core::query::{FileFailure, ParseRequest, ParseSummary, TracingStats};
use loglens_core::time::{normalize_timestamp, parse_target_zone};
use loglens_core::{LoglensError, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::correlate::correlate;
use crate::detect::detect_format;
use crate::extract::{Extraction, extract};

pub struct ParsedBatch {
    pub records: Vec<LogRecord>,
    pub summary: ParseSummary,
}

/// Resolves the inputs, extracts every file, normalizes timestamps,
/// optionally correlates traces, and writes the combined output if asked.
///
/// A file that cannot be read or parsed is counted as failed and the batch
/// carries on. Batch-level problems (nothing to read, an unknown zone, an
/// unwritable output) are errors.
pub fn run_batch(req: &ParseRequest) -> Result<ParsedBatch> {
    let zone = parse_target_zone(&req.time_zone)?;
    let files = expand_inputs(&req.inputs)?;
    if files.is_empty() {
        return Err(LoglensError::InvalidArgument(
            "no input files resolved".to_string(),
        ));
    }

    let mut records = Vec::new();
    let mut summary = ParseSummary::default();
    for path in &files {
        match extract_file(path, req.format) {
            Ok(mut extraction) => {
                debug!(
                    path = %path.display(),
                    records = extraction.records.len(),
                    skipped = extraction.skipped,
                    "extracted log file"
                );
                records.append(&mut extraction.records);
                summary.skipped_entries += extraction.skipped;
                summary.processed_files += 1;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to process log file");
                summary.failed_files += 1;
                summary.failures.push(FileFailure {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    for (idx, record) in records.iter_mut().enumerate() {
        record.sequence_index = idx;
        normalize_record_timestamps(record, &zone);
    }

    let traces = if req.extract_tracing {
        Some(correlate(&mut records))
    } else {
        None
    };

    summarize(&records, traces, &mut summary);

    if let Some(output) = &req.output_path {
        write_output(output, &records)?;
        summary.output_path = Some(output.display().to_string());
    }

    info!(
        files = files.len(),
        failed = summary.failed_files,
        records = summary.total_logs,
        "log batch parsed"
    );
    Ok(ParsedBatch { records, summary })
}

/// Files named directly are kept as given; directories expand recursively to
/// the regular files beneath them, in path order.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&input.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| {
            LoglensError::InvalidArgument(format!("bad input directory {}: {e}", input.display()))
        })?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable path");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

/// Reads and extracts one file. An XML file in which no document or
/// fragment parses is a failure rather than an empty file.
pub fn extract_file(path: &Path, format: LogFormat) -> Result<Extraction> {
    if !path.is_file() {
        return Err(LoglensError::Io(format!(
            "{} is not a readable file",
            path.display()
        )));
    }
    let format = match format {
        LogFormat::Auto => detect_format(path)?,
        explicit => explicit,
    };
    let bytes = fs::read(path)
        .map_err(|e| LoglensError::Io(format!("failed reading {}: {e}", path.display())))?;
    let content = String::from_utf8_lossy(&bytes);

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut extraction = extract(&content, format);
    if format == LogFormat::Xml && extraction.is_unparseable() {
        return Err(LoglensError::Parse(format!(
            "no parseable xml in {}: {} malformed fragments",
            path.display(),
            extraction.skipped
        )));
    }
    for record in &mut extraction.records {
        record.source_file = source.clone();
    }
    Ok(extraction)
}

/// Rewrites every non-empty string timestamp field in `zone`; values no
/// layout accepts are left untouched.
pub fn normalize_record_timestamps(record: &mut LogRecord, zone: &Tz) {
    for key in TIMESTAMP_FIELDS {
        if let Some(Value::String(raw)) = record.fields.get_mut(key) {
            if !raw.is_empty() {
                *raw = normalize_timestamp(raw, zone);
            }
        }
    }
}

fn summarize(records: &[LogRecord], traces: Option<usize>, summary: &mut ParseSummary) {
    summary.total_logs = records.len();
    summary.level_counts = count_by(records, LogRecord::level);
    summary.service_counts = count_by(records, LogRecord::service);
    summary.tracing = traces.map(|_| {
        let traced: Vec<&str> = records
            .iter()
            .filter_map(|r| r.trace_id.as_deref())
            .collect();
        let unique = traced.iter().copied().collect::<HashSet<_>>().len();
        TracingStats {
            unique_traces: unique,
            logs_with_trace_info: traced.len(),
            avg_logs_per_trace: (unique > 0).then(|| traced.len() as f64 / unique as f64),
        }
    });
}

fn count_by(
    records: &[LogRecord],
    key: impl Fn(&LogRecord) -> Option<&str>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in records.iter().filter_map(|r| key(r)) {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Writes records as one pretty-printed JSON array.
pub fn write_output(path: &Path, records: &[LogRecord]) -> Result<()> {
    write_json_pretty(path, records)
}
