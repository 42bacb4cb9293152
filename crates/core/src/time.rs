use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::{LoglensError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    /// Literal `Z` suffix; skipped when the input has no `Z`.
    Zulu,
    /// Numeric offset; skipped when the input has neither `+` nor `-`.
    Offset,
    /// No zone information; interpreted as UTC.
    Naive,
}

struct Layout {
    pattern: &'static str,
    zone: Zone,
}

const STRICT_LAYOUTS: [Layout; 6] = [
    Layout {
        pattern: "%Y-%m-%dT%H:%M:%S%.fZ",
        zone: Zone::Zulu,
    },
    Layout {
        pattern: "%Y-%m-%dT%H:%M:%S%.f%z",
        zone: Zone::Offset,
    },
    Layout {
        pattern: "%Y-%m-%dT%H:%M:%S%z",
        zone: Zone::Offset,
    },
    Layout {
        pattern: "%Y-%m-%dT%H:%M:%SZ",
        zone: Zone::Zulu,
    },
    Layout {
        pattern: "%Y-%m-%d %H:%M:%S%.f",
        zone: Zone::Naive,
    },
    Layout {
        pattern: "%Y-%m-%d %H:%M:%S",
        zone: Zone::Naive,
    },
];

const LENIENT_OFFSET_LAYOUTS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%d/%b/%Y:%H:%M:%S %z",
    "%a %b %d %H:%M:%S %z %Y",
    "%Y-%m-%dT%H:%M%z",
];

const LENIENT_NAIVE_LAYOUTS: [&str; 11] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S,%3f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
];

const LENIENT_DATE_LAYOUTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%b %d, %Y"];

pub fn parse_target_zone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| LoglensError::Config(format!("unknown time zone {name}: {e}")))
}

/// Parses a raw timestamp. The six strict layouts are tried first, then a
/// lenient set; values without zone information are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    parse_strict(raw).or_else(|| parse_lenient(raw.trim()))
}

/// Re-expresses `raw` as ISO-8601 in `zone`, or returns it unchanged when no
/// layout accepts it.
pub fn normalize_timestamp(raw: &str, zone: &Tz) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts
            .with_timezone(zone)
            .fixed_offset()
            .to_rfc3339_opts(SecondsFormat::AutoSi, false),
        None => raw.to_string(),
    }
}

fn parse_strict(raw: &str) -> Option<DateTime<FixedOffset>> {
    for layout in &STRICT_LAYOUTS {
        let parsed = match layout.zone {
            Zone::Zulu if !raw.contains('Z') => continue,
            Zone::Offset if !raw.contains('+') && !raw.contains('-') => continue,
            Zone::Offset => DateTime::parse_from_str(raw, layout.pattern).ok(),
            Zone::Zulu | Zone::Naive => NaiveDateTime::parse_from_str(raw, layout.pattern)
                .ok()
                .map(as_utc),
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}

fn parse_lenient(raw: &str) -> Option<DateTime<FixedOffset>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return Some(ts);
    }
    if let Some(ts) = LENIENT_OFFSET_LAYOUTS
        .iter()
        .find_map(|p| DateTime::parse_from_str(raw, p).ok())
    {
        return Some(ts);
    }
    if let Some(ts) = LENIENT_NAIVE_LAYOUTS
        .iter()
        .find_map(|p| NaiveDateTime::parse_from_str(raw, p).ok())
    {
        return Some(as_utc(ts));
    }
    LENIENT_DATE_LAYOUTS
        .iter()
        .find_map(|p| NaiveDate::parse_from_str(raw, p).ok())
        .map(|d| as_utc(d.and_time(NaiveTime::MIN)))
}

fn as_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

/// Parses an absolute RFC 3339 instant or a relative duration such as `15m`
/// counted back from now.
pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration).map_err(|e| {
                LoglensError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(LoglensError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> Tz {
        parse_target_zone("UTC").unwrap()
    }

    #[test]
    fn normalizes_each_strict_layout() {
        let tz = utc();
        let cases = [
            ("2024-01-01T10:00:00.250Z", "2024-01-01T10:00:00.250+00:00"),
            ("2024-01-01T12:00:00.5+02:00", "2024-01-01T10:00:00.500+00:00"),
            ("2024-01-01T05:00:00-05:00", "2024-01-01T10:00:00+00:00"),
            ("2024-01-01T10:00:00Z", "2024-01-01T10:00:00+00:00"),
            ("2024-01-01 10:00:00.123456", "2024-01-01T10:00:00.123456+00:00"),
            ("2024-01-01 10:00:00", "2024-01-01T10:00:00+00:00"),
        ];
        for (raw, want) in cases {
            assert_eq!(normalize_timestamp(raw, &tz), want, "input {raw}");
        }
    }

    #[test]
    fn converts_to_target_zone() {
        let tz = parse_target_zone("America/New_York").unwrap();
        assert_eq!(
            normalize_timestamp("2024-01-01T10:00:00Z", &tz),
            "2024-01-01T05:00:00-05:00"
        );
        let tz = parse_target_zone("Asia/Kolkata").unwrap();
        assert_eq!(
            normalize_timestamp("2024-06-01 00:00:00", &tz),
            "2024-06-01T05:30:00+05:30"
        );
    }

    #[test]
    fn normalized_output_parses_back_to_same_instant() {
        let tz = parse_target_zone("Europe/Berlin").unwrap();
        let raw = "2024-03-10T08:15:30.5Z";
        let normalized = normalize_timestamp(raw, &tz);
        assert_eq!(parse_timestamp(&normalized), parse_timestamp(raw));
    }

    #[test]
    fn lenient_fallback_accepts_common_shapes() {
        assert!(parse_timestamp("Mon, 01 Jan 2024 10:00:00 +0000").is_some());
        assert!(parse_timestamp("10/Oct/2023:13:55:36 -0700").is_some());
        assert!(parse_timestamp("2024-01-01 10:00:00,123").is_some());
        assert!(parse_timestamp(" 2024/01/01 10:00:00 ").is_some());
        assert_eq!(
            parse_timestamp("2024-01-01").map(|t| t.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn unparseable_input_is_returned_unchanged() {
        let tz = utc();
        for raw in ["yesterday-ish", "", "12:00", "2024-13-45 99:00:00"] {
            assert_eq!(normalize_timestamp(raw, &tz), raw);
        }
    }

    #[test]
    fn rejects_unknown_zone() {
        assert!(parse_target_zone("Mars/Olympus").is_err());
    }

    #[test]
    fn parses_rfc3339() {
        let ts = parse_time_or_relative("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_duration() {
        let now = Utc::now();
        let ts = parse_time_or_relative("5m").unwrap();
        assert!(ts < now);
    }

    #[test]
    fn rejects_invalid() {
        assert!(parse_time_or_relative("nope").is_err());
    }
}
