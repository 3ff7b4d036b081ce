use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Conversion failures between domain values and their sqlite column forms.
/// Repos fold these into the owning domain's error at the call site.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed timestamp column: {value}")]
    Timestamp { value: String },
    #[error("malformed json column: {message}")]
    Json { message: String },
    #[error("enum does not encode to a bare string: {value}")]
    Enum { value: String },
}

/// Timestamps are stored as RFC 3339 text in UTC at millisecond precision,
/// so string comparison orders rows chronologically.
pub fn encode_ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_ts(value: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| CodecError::Timestamp {
            value: value.to_string(),
        })
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|err| CodecError::Json {
        message: err.to_string(),
    })
}

pub fn decode_json<T: DeserializeOwned>(value: &str) -> Result<T, CodecError> {
    serde_json::from_str(value).map_err(|err| CodecError::Json {
        message: err.to_string(),
    })
}

/// Unit enums are stored as their serde string form (`"Queued"`, not an
/// ordinal), which keeps rows greppable and independent of variant order.
pub fn encode_enum<T: Serialize>(value: &T) -> Result<String, CodecError> {
    match serde_json::to_value(value).map_err(|err| CodecError::Json {
        message: err.to_string(),
    })? {
        Value::String(text) => Ok(text),
        other => Err(CodecError::Enum {
            value: other.to_string(),
        }),
    }
}

pub fn decode_enum<T: DeserializeOwned>(value: &str) -> Result<T, CodecError> {
    serde_json::from_value(Value::String(value.to_string())).map_err(|err| CodecError::Json {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gradus_core::types::{PendingState, ProgressStatus};

    #[test]
    fn enums_store_as_bare_strings() {
        assert_eq!(
            encode_enum(&ProgressStatus::AwaitingReview).unwrap(),
            "AwaitingReview"
        );
        assert_eq!(encode_enum(&PendingState::Queued).unwrap(), "Queued");
        let decoded: PendingState = decode_enum("Replaying").unwrap();
        assert_eq!(decoded, PendingState::Replaying);
    }

    #[test]
    fn unknown_enum_value_is_an_error() {
        let err = decode_enum::<ProgressStatus>("Paused").unwrap_err();
        assert!(matches!(err, CodecError::Json { .. }));
    }

    #[test]
    fn timestamps_round_trip_and_sort_textually() {
        let earlier = Utc::now();
        let later = earlier + Duration::milliseconds(3);
        let earlier_text = encode_ts(&earlier);
        let later_text = encode_ts(&later);

        assert!(earlier_text < later_text);
        let decoded = decode_ts(&later_text).unwrap();
        assert_eq!(encode_ts(&decoded), later_text);
        assert!(decode_ts("yesterday-ish").is_err());
    }
}
