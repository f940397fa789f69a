use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the provider delivered an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Url,
    B64Json,
}

impl ResponseFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::B64Json => "b64_json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(Self::Url),
            "b64_json" => Ok(Self::B64Json),
            other => Err(format!("unknown response format `{other}`")),
        }
    }
}

/// A stored image row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub session_id: String,
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: Option<String>,
    pub response_format: ResponseFormat,
    pub image_path: String,
    pub timestamp: DateTime<Utc>,
}

/// A row about to be inserted; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub session_id: String,
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: Option<String>,
    pub response_format: ResponseFormat,
    pub image_path: String,
    pub timestamp: DateTime<Utc>,
}

/// Conjunction of listing predicates. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFilter {
    /// Exact match.
    pub session_id: Option<String>,
    /// Exact match.
    pub model: Option<String>,
    /// Substring match.
    pub prompt: Option<String>,
}

impl ImageFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

/// Storage representation of a timestamp: RFC3339, UTC, millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses RFC3339, or a naive `YYYY-MM-DD HH:MM:SS[.f]` (space or `T`
/// separated) interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:30:05+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:05"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn storage_format_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(format_timestamp(&a), "2024-03-01T09:00:00.000Z");
    }

    #[test]
    fn response_format_round_trips_through_text() {
        for f in [ResponseFormat::Url, ResponseFormat::B64Json] {
            assert_eq!(f.as_str().parse::<ResponseFormat>(), Ok(f));
        }
        assert!("png".parse::<ResponseFormat>().is_err());
    }
}
