use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LoglensError, Result};
use crate::filter::LogFormat;
use crate::time::parse_target_zone;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub time_zone: String,
    pub log_format: LogFormat,
    pub extract_tracing: bool,
    /// Traces with fewer records are left out of trace analysis.
    pub min_trace_records: usize,
    pub max_traces: usize,
    pub sample_logs_per_span: usize,
    pub message_preview_chars: usize,
    pub top_services: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            log_format: LogFormat::Auto,
            extract_tracing: true,
            min_trace_records: 2,
            max_traces: 10,
            sample_logs_per_span: 3,
            message_preview_chars: 200,
            top_services: 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    time_zone: Option<String>,
    log_format: Option<String>,
    extract_tracing: Option<bool>,
    min_trace_records: Option<usize>,
    max_traces: Option<usize>,
    sample_logs_per_span: Option<usize>,
    message_preview_chars: Option<usize>,
    top_services: Option<usize>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("LOGLENS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("loglens/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| LoglensError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| LoglensError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| LoglensError::Config(format!("bad {name} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        time_zone: env::var("LOGLENS_TIME_ZONE").ok(),
        log_format: env::var("LOGLENS_LOG_FORMAT").ok(),
        extract_tracing: env_parsed("LOGLENS_EXTRACT_TRACING")?,
        min_trace_records: env_parsed("LOGLENS_MIN_TRACE_RECORDS")?,
        max_traces: env_parsed("LOGLENS_MAX_TRACES")?,
        sample_logs_per_span: None,
        message_preview_chars: None,
        top_services: None,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.time_zone {
        parse_target_zone(&v).map_err(|e| {
            LoglensError::Config(format!("bad time_zone in {source}: {e} (value={v})"))
        })?;
        cfg.time_zone = v;
    }
    if let Some(v) = overrides.log_format {
        cfg.log_format = LogFormat::from_str(&v).map_err(|e| {
            LoglensError::Config(format!("bad log_format in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.extract_tracing {
        cfg.extract_tracing = v;
    }
    if let Some(v) = overrides.min_trace_records {
        cfg.min_trace_records = v;
    }
    if let Some(v) = overrides.max_traces {
        cfg.max_traces = v;
    }
    if let Some(v) = overrides.sample_logs_per_span {
        cfg.sample_logs_per_span = v;
    }
    if let Some(v) = overrides.message_preview_chars {
        cfg.message_preview_chars = v;
    }
    if let Some(v) = overrides.top_services {
        cfg.top_services = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tool_parameters() {
        let cfg = Config::default();
        assert_eq!(cfg.time_zone, "UTC");
        assert_eq!(cfg.log_format, LogFormat::Auto);
        assert!(cfg.extract_tracing);
        assert_eq!(cfg.min_trace_records, 2);
        assert_eq!(cfg.max_traces, 10);
    }

    #[test]
    fn file_overrides_parse_from_toml() {
        let parsed: ConfigOverrides = toml::from_str(
            r#"
            time_zone = "Europe/Paris"
            log_format = "text"
            min_trace_records = 1
            "#,
        )
        .unwrap();
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, parsed, "config file").unwrap();

        assert_eq!(cfg.time_zone, "Europe/Paris");
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.min_trace_records, 1);
        assert_eq!(cfg.max_traces, 10);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = Config::default();
        let bad_zone = ConfigOverrides {
            time_zone: Some("Nowhere/Land".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_zone, "environment").is_err());

        let bad_format = ConfigOverrides {
            log_format: Some("yaml".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_format, "config file").is_err());
        assert_eq!(cfg, Config::default());
    }
}
