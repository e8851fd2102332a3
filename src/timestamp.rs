use std::{fmt, str::FromStr};

use chrono::{DateTime, Local, NaiveDateTime};
use regex::Regex;

lazy_static::lazy_static! {
    static ref OFFSET_SUFFIX_RE: Regex = Regex::new(r"(?:[Zz]|[+-]\d{2}:?\d{2})$").unwrap();
    static ref OFFSET_RE: Regex = Regex::new(r"^(?P<sign>[+-])(?P<hours>\d{2}):(?P<minutes>\d{2})$").unwrap();
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// A UTC offset rendered as `±HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcOffset {
    minutes: i32,
}

impl UtcOffset {
    pub const UTC: UtcOffset = UtcOffset { minutes: 0 };

    pub fn from_minutes(minutes: i32) -> Self {
        UtcOffset { minutes }
    }

    /// Offset of the process's local time zone, right now.
    pub fn local() -> Self {
        let seconds = Local::now().offset().local_minus_utc();
        UtcOffset {
            minutes: seconds / 60,
        }
    }

    pub fn minutes(self) -> i32 {
        self.minutes
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let abs = self.minutes.unsigned_abs();
        write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
    }
}

impl FromStr for UtcOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("z") {
            return Ok(UtcOffset::UTC);
        }
        let caps = OFFSET_RE
            .captures(s)
            .ok_or_else(|| format!("expected an offset like +02:00, got '{s}'"))?;
        let hours: i32 = caps["hours"].parse().map_err(|e| format!("{e}"))?;
        let minutes: i32 = caps["minutes"].parse().map_err(|e| format!("{e}"))?;
        if hours > 23 || minutes > 59 {
            return Err(format!("offset '{s}' out of range"));
        }
        let total = hours * 60 + minutes;
        Ok(UtcOffset {
            minutes: if &caps["sign"] == "-" { -total } else { total },
        })
    }
}

/// Whether the time part of `timestamp` already carries `Z` or a numeric offset.
///
/// The date and time may be separated by `T`, `t` or a space, as RFC 3339 allows.
pub fn has_offset(timestamp: &str) -> bool {
    timestamp
        .trim()
        .split_once(['T', 't', ' '])
        .is_some_and(|(_, time)| OFFSET_SUFFIX_RE.is_match(time))
}

/// Append `offset` unless the timestamp is already offset-qualified.
pub fn with_offset(timestamp: &str, offset: UtcOffset) -> String {
    if has_offset(timestamp) {
        timestamp.to_string()
    } else {
        format!("{timestamp}{offset}")
    }
}

/// The offset suffix a timestamp was written with, normalized to `±HH:MM`.
pub fn offset_of(timestamp: &str) -> Option<UtcOffset> {
    let ts = timestamp.trim();
    if let Some(naive) = ts.strip_suffix(['Z', 'z'])
        && NAIVE_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(naive, fmt).is_ok())
    {
        return Some(UtcOffset::UTC);
    }
    let parsed = DateTime::parse_from_rfc3339(ts).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(ts, fmt).ok())
    })?;
    Some(UtcOffset::from_minutes(parsed.offset().local_minus_utc() / 60))
}

/// Accepts RFC 3339 timestamps and the editor's `YYYY-MM-DDTHH:MM[:SS[.fff]]` form, bare
/// or followed by `Z` or a numeric offset.
pub fn is_valid_timestamp(timestamp: &str) -> bool {
    let ts = timestamp.trim();
    if ts.is_empty() {
        return false;
    }
    if offset_of(ts).is_some() {
        return true;
    }
    NAIVE_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(ts, fmt).is_ok())
}
