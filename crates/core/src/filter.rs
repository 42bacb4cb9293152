use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoglensError, Result};

/// Levels that mark a record as an error.
pub const ERROR_LEVELS: [&str; 4] = ["ERROR", "SEVERE", "FATAL", "CRITICAL"];

pub fn is_error_level(level: &str) -> bool {
    ERROR_LEVELS
        .iter()
        .any(|l| l.eq_ignore_ascii_case(level.trim()))
}

/// On-disk layout of a log file, or `Auto` to sniff it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Auto,
    Json,
    Xml,
    Text,
}

impl FromStr for LogFormat {
    type Err = LoglensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "json" | "jsonl" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(LoglensError::Parse(format!("unknown log format: {s}"))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Text => "text",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self {
            since: None,
            until: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        self.since.is_none_or(|s| *ts >= s) && self.until.is_none_or(|u| *ts <= u)
    }
}
