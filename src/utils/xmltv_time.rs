//! XMLTV timestamp parsing
//!
//! Guide timestamps are `YYYYMMDDhhmmss` optionally followed by a `±HHMM`
//! offset. Anything else falls back to flexible RFC 3339 / RFC 2822 / naive
//! parsing.
//!
//! # Offset convention
//!
//! After building the UTC instant from the digits, the offset is *added*:
//! the signed hour part (`±HH`) and the unsigned minute part (`MM`) are both
//! added to the instant. `20240101120000 +0200` therefore yields
//! `2024-01-01T14:00:00Z`. Start and stop go through the same function, so
//! `stop > start` comparisons stay meaningful.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::errors::DateTimeError;

fn compact_pattern() -> &'static Regex {
    static COMPACT: OnceLock<Regex> = OnceLock::new();
    COMPACT.get_or_init(|| {
        Regex::new(r"^([0-9]{4})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})\s*([+-][0-9]{2})([0-9]{2})$")
            .expect("static xmltv datetime regex")
    })
}

fn spaced_offset_pattern() -> &'static Regex {
    static SPACED: OnceLock<Regex> = OnceLock::new();
    SPACED.get_or_init(|| Regex::new(r"\s+([+-][0-9]{4})$").expect("static offset regex"))
}

/// Normalize an XMLTV timestamp
///
/// A bare 14-digit block gets ` +0000`; whitespace before a trailing offset
/// is collapsed.
pub fn normalize_xmltv_datetime(input: &str) -> Result<String, DateTimeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DateTimeError::Empty);
    }

    if trimmed.len() == 14 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!("{trimmed} +0000"));
    }

    Ok(spaced_offset_pattern().replace(trimmed, "$1").into_owned())
}

/// Parse an XMLTV timestamp into UTC
pub fn parse_xmltv_datetime(input: &str) -> Result<DateTime<Utc>, DateTimeError> {
    let normalized = normalize_xmltv_datetime(input)?;

    if let Some(caps) = compact_pattern().captures(&normalized) {
        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        let invalid = || DateTimeError::InvalidComponents {
            input: input.to_string(),
        };

        let year: i32 = field(1).parse().map_err(|_| invalid())?;
        let month: u32 = field(2).parse().map_err(|_| invalid())?;
        let day: u32 = field(3).parse().map_err(|_| invalid())?;
        let hour: u32 = field(4).parse().map_err(|_| invalid())?;
        let minute: u32 = field(5).parse().map_err(|_| invalid())?;
        let second: u32 = field(6).parse().map_err(|_| invalid())?;

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .ok_or_else(invalid)?;
        let utc = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);

        let offset_hours: i64 = field(7).parse().map_err(|_| invalid())?;
        let offset_minutes: i64 = field(8).parse().map_err(|_| invalid())?;

        return utc
            .checked_add_signed(Duration::hours(offset_hours))
            .and_then(|dt| dt.checked_add_signed(Duration::minutes(offset_minutes)))
            .ok_or_else(|| DateTimeError::OutOfRange {
                input: input.to_string(),
            });
    }

    parse_flexible(input)
}

/// Parse a datetime from the common non-XMLTV formats a guide may carry
///
/// Supports:
/// - RFC3339 with timezone or offset: "2023-01-01T12:00:00Z"
/// - RFC2822: "Sun, 01 Jan 2023 12:00:00 +0000"
/// - Naive formats (assumed UTC): "2023-01-01 12:00:00", "20230101T120000"
pub fn parse_flexible(datetime_str: &str) -> Result<DateTime<Utc>, DateTimeError> {
    let trimmed = datetime_str.trim();
    if trimmed.is_empty() {
        return Err(DateTimeError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y%m%dT%H%M%S",
        "%Y%m%d%H%M",
    ];

    for format in &naive_formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    Err(DateTimeError::InvalidFormat {
        input: datetime_str.to_string(),
    })
}
