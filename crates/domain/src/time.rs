//! Timestamps for action lifecycles and fired events.
//!
//! On the wire every timestamp is RFC 3339 in UTC with millisecond
//! precision, e.g. `2024-05-01T12:00:00.250Z`. Fields opt in with
//! `#[serde(with = "crate::time::rfc3339")]`.

use chrono::{DateTime, SecondsFormat, Utc};

pub type Timestamp = DateTime<Utc>;

#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Wire form of a timestamp.
#[must_use]
pub fn format(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp, normalizing it to UTC.
///
/// # Errors
///
/// Returns the chrono parse error for malformed input.
pub fn parse(text: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|parsed| parsed.to_utc())
}

pub mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;

    pub fn serialize<S>(timestamp: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(serde::de::Error::custom)
    }

    /// Same format for optional fields; `None` maps to `null`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use crate::time::Timestamp;

        #[allow(clippy::ref_option)]
        pub fn serialize<S>(timestamp: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match timestamp {
                Some(timestamp) => serializer.serialize_some(&crate::time::format(timestamp)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|text| crate::time::parse(&text).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "rfc3339")]
        at: Timestamp,
        #[serde(default, with = "rfc3339::option", skip_serializing_if = "Option::is_none")]
        until: Option<Timestamp>,
    }

    fn noon() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn should_format_with_milliseconds_and_zulu_suffix() {
        assert_eq!(format(&noon()), "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn should_normalize_offset_to_utc_when_parsing() {
        assert_eq!(parse("2024-05-01T14:00:00+02:00").unwrap(), noon());
        assert!(parse("yesterday").is_err());
    }

    #[test]
    fn should_serialize_fields_in_wire_format() {
        let stamped = Stamped {
            at: noon(),
            until: None,
        };
        assert_eq!(
            serde_json::to_value(&stamped).unwrap(),
            json!({"at": "2024-05-01T12:00:00.000Z"})
        );
    }

    #[test]
    fn should_read_optional_field_when_present() {
        let stamped: Stamped = serde_json::from_value(json!({
            "at": "2024-05-01T12:00:00Z",
            "until": "2024-05-01T12:00:00.000Z",
        }))
        .unwrap();
        assert_eq!(stamped.until, Some(noon()));
    }
}
