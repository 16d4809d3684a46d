//! Time range handling for acquisition windows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive acquisition window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(rename = "from")]
    pub start: DateTime<Utc>,
    #[serde(rename = "to")]
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Parse a window from two ISO 8601 strings.
    ///
    /// A date-only `from` starts at 00:00:00Z and a date-only `to` ends at
    /// 23:59:59Z, so `("2020-06-20", "2020-06-20")` covers the whole day.
    pub fn parse(from: &str, to: &str) -> Result<Self, TimeParseError> {
        Ok(Self {
            start: parse_instant(from, NaiveTime::MIN)?,
            end: parse_instant(to, end_of_day())?,
        })
    }

    /// True when start <= end.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Start formatted the way the processing API expects ("2020-06-20T00:00:00Z").
    pub fn provider_from(&self) -> String {
        format_instant(&self.start)
    }

    /// End formatted the way the processing API expects.
    pub fn provider_to(&self) -> String {
        format_instant(&self.end)
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse an ISO 8601 instant, filling in `time_of_day` for date-only input.
fn parse_instant(s: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Try date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(time_of_day)));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_date_only_covers_whole_day() {
        let range = TimeRange::parse("2020-06-20", "2020-06-20").unwrap();
        assert_eq!(range.provider_from(), "2020-06-20T00:00:00Z");
        assert_eq!(range.provider_to(), "2020-06-20T23:59:59Z");
        assert!(range.is_ordered());
    }

    #[test]
    fn test_parse_rfc3339() {
        let range = TimeRange::parse("2024-01-15T12:00:00Z", "2024-01-15T18:30:00+02:00").unwrap();
        assert_eq!(range.start.year(), 2024);
        assert_eq!(range.start.hour(), 12);
        assert_eq!(range.end.hour(), 16);
        assert_eq!(range.end.minute(), 30);
    }

    #[test]
    fn test_reversed_range_is_not_ordered() {
        let range = TimeRange::parse("2020-06-21", "2020-06-20").unwrap();
        assert!(!range.is_ordered());
    }

    #[test]
    fn test_invalid_format() {
        assert!(TimeRange::parse("yesterday", "2020-06-20").is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let range = TimeRange::parse("2020-06-20", "2020-06-20").unwrap();
        let json = serde_json::to_value(range).unwrap();
        assert_eq!(json["from"], "2020-06-20T00:00:00Z");
        assert_eq!(json["to"], "2020-06-20T23:59:59Z");
    }
}
