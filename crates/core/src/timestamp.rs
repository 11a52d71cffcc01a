//! Timestamps as they appear in stored and outbound records.
//!
//! Records in the object store keep human-readable timestamps. Forward
//! recipients and message readers expect milliseconds since the Unix epoch, so
//! every outbound record goes through [`Timestamp::normalized`] first.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp field in either of its two wire shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// Textual form; the empty string means "not set".
    Text(String),
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::empty()
    }
}

impl Timestamp {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Textual timestamp for a point in time (RFC 3339, millisecond precision).
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::Text(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    /// Epoch milliseconds, if this timestamp holds or parses to one.
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(ms) => Some(*ms),
            Self::Text(text) => parse_millis(text),
        }
    }

    /// Numeric form of this timestamp.
    ///
    /// Numeric input is returned unchanged. Empty, absent or unparsable text maps
    /// to [`Timestamp::empty`]; normalization never fails.
    pub fn normalized(&self) -> Self {
        match self.as_millis() {
            Some(ms) => Self::Millis(ms),
            None => Self::empty(),
        }
    }
}

/// Parse the textual timestamp formats found in stored records.
///
/// Accepts plain integers (already epoch milliseconds), RFC 3339, RFC 2822,
/// the `Date.prototype.toString()` layout written by older producers
/// (`Mon Oct 19 2026 14:03:07 GMT-0700 (MST)`) and naive `YYYY-MM-DD HH:MM:SS`
/// (read as UTC).
pub fn parse_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis());
    }

    let without_zone_name = text.find(" (").map_or(text, |idx| &text[..idx]);
    if let Ok(dt) = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z") {
        return Some(dt.timestamp_millis());
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn numeric_input_is_left_alone() {
        let ts = Timestamp::Millis(1_700_000_000_123);
        assert_eq!(ts.normalized(), Timestamp::Millis(1_700_000_000_123));
    }

    #[test]
    fn empty_and_blank_map_to_empty() {
        assert_eq!(Timestamp::empty().normalized(), Timestamp::empty());
        assert_eq!(Timestamp::Text("   ".into()).normalized(), Timestamp::empty());
    }

    #[test]
    fn unparsable_text_maps_to_empty() {
        assert_eq!(Timestamp::Text("next tuesday".into()).normalized(), Timestamp::empty());
    }

    #[test]
    fn rfc3339_text_becomes_millis() {
        let instant = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let ts = Timestamp::at(instant);
        assert_eq!(ts.normalized(), Timestamp::Millis(instant.timestamp_millis()));
    }

    #[test]
    fn legacy_date_string_becomes_millis() {
        let ts = Timestamp::Text("Mon Oct 19 2026 14:03:07 GMT-0700 (MST)".into());
        let expected = Utc.with_ymd_and_hms(2026, 10, 19, 21, 3, 7).unwrap();
        assert_eq!(ts.normalized(), Timestamp::Millis(expected.timestamp_millis()));
    }

    #[test]
    fn numeric_string_is_read_as_millis() {
        assert_eq!(
            Timestamp::Text("1700000000000".into()).normalized(),
            Timestamp::Millis(1_700_000_000_000)
        );
    }

    #[test]
    fn deserializes_both_shapes() {
        let n: Timestamp = serde_json::from_str("42").unwrap();
        let t: Timestamp = serde_json::from_str("\"\"").unwrap();
        assert_eq!(n, Timestamp::Millis(42));
        assert!(t.is_empty());
    }

    proptest! {
        #[test]
        fn normalizing_numeric_input_is_idempotent(ms in any::<i64>()) {
            let once = Timestamp::Millis(ms).normalized();
            prop_assert_eq!(&once, &Timestamp::Millis(ms));
            prop_assert_eq!(once.normalized(), once);
        }

        #[test]
        fn normalizing_text_never_fails_and_is_stable(text in ".{0,40}") {
            let once = Timestamp::Text(text).normalized();
            prop_assert_eq!(once.normalized(), once);
        }
    }
}
