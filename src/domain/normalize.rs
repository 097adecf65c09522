//! Shaping of external data before it reaches a client

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::errors::AppError;

/// Largest integer a JSON consumer using IEEE-754 doubles can hold exactly.
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Replaces every integer beyond [`MAX_SAFE_INTEGER`] with its decimal string.
pub fn stringify_wide_integers(value: Value) -> Value {
    match value {
        Value::Number(number) if is_wide(&number) => Value::String(number.to_string()),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(stringify_wide_integers).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, stringify_wide_integers(value)))
                .collect(),
        ),
        other => other,
    }
}

fn is_wide(number: &Number) -> bool {
    if let Some(value) = number.as_i64() {
        return value.unsigned_abs() > MAX_SAFE_INTEGER;
    }
    number.as_u64().is_some_and(|value| value > MAX_SAFE_INTEGER)
}

/// Accepts RFC 3339, a bare `YYYY-MM-DDTHH:MM:SS` (read as UTC) or a plain date.
pub fn parse_date_like(value: &str) -> Result<DateTime<Utc>, AppError> {
    let trimmed = value.trim();
    let invalid = || AppError::InvalidDateFormat {
        value: value.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(invalid)
}

/// ISO-8601 UTC instant for `value`, or the current instant when absent.
pub fn to_iso_or_now(value: Option<&str>) -> Result<String, AppError> {
    to_iso_or(value, Utc::now())
}

pub fn to_iso_or(value: Option<&str>, now: DateTime<Utc>) -> Result<String, AppError> {
    let instant = match value {
        Some(value) => parse_date_like(value)?,
        None => now,
    };
    Ok(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// `YYYY-MM-DD` for `value`, or today's UTC date when absent.
pub fn to_date_only_or_today(value: Option<&str>) -> Result<String, AppError> {
    to_date_only_or(value, Utc::now())
}

pub fn to_date_only_or(value: Option<&str>, now: DateTime<Utc>) -> Result<String, AppError> {
    let instant = match value {
        Some(value) => parse_date_like(value)?,
        None => now,
    };
    Ok(instant.format("%Y-%m-%d").to_string())
}

/// Fresh key per mutating call so upstream retries never double-apply.
pub fn idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 30, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn stringifies_only_unsafe_integers() {
        let normalized = stringify_wide_integers(json!({
            "amount": 1500,
            "version": 9_007_199_254_740_993_u64,
            "negative": -9_007_199_254_740_993_i64,
            "edge": 9_007_199_254_740_991_u64,
            "ratio": 0.5,
            "label": "unchanged"
        }));

        assert_eq!(normalized["amount"], json!(1500));
        assert_eq!(normalized["version"], json!("9007199254740993"));
        assert_eq!(normalized["negative"], json!("-9007199254740993"));
        assert_eq!(normalized["edge"], json!(9_007_199_254_740_991_u64));
        assert_eq!(normalized["ratio"], json!(0.5));
        assert_eq!(normalized["label"], json!("unchanged"));
    }

    #[test]
    fn stringifies_nested_values() {
        let normalized = stringify_wide_integers(json!({
            "invoice": {
                "payment_requests": [
                    {"computed_amount_money": {"amount": 12_345_678_901_234_567_u64}}
                ]
            }
        }));

        assert_eq!(
            normalized["invoice"]["payment_requests"][0]["computed_amount_money"]["amount"],
            json!("12345678901234567")
        );
    }

    #[test]
    fn leaves_scalars_and_nulls_untouched() {
        assert_eq!(stringify_wide_integers(Value::Null), Value::Null);
        assert_eq!(stringify_wide_integers(json!(true)), json!(true));
    }

    #[test]
    fn iso_defaults_to_now() {
        let iso = to_iso_or(None, fixed_now()).expect("now");
        assert_eq!(iso, "2025-06-15T12:30:00.000Z");
    }

    #[test]
    fn iso_normalizes_offsets_to_utc() {
        let iso = to_iso_or(Some("2025-03-01T09:00:00-06:00"), fixed_now()).expect("offset");
        assert_eq!(iso, "2025-03-01T15:00:00.000Z");
    }

    #[test]
    fn date_only_accepts_plain_dates_and_timestamps() {
        assert_eq!(
            to_date_only_or(Some("2025-07-04"), fixed_now()).expect("date"),
            "2025-07-04"
        );
        assert_eq!(
            to_date_only_or(Some("2025-07-04T23:00:00Z"), fixed_now()).expect("timestamp"),
            "2025-07-04"
        );
        assert_eq!(to_date_only_or(None, fixed_now()).expect("today"), "2025-06-15");
    }

    #[test]
    fn unparseable_dates_are_rejected() {
        for value in ["tomorrow", "", "2025-13-01"] {
            let error = to_iso_or(Some(value), fixed_now()).expect_err(value);
            assert!(matches!(error, AppError::InvalidDateFormat { .. }));
        }
    }

    #[test]
    fn idempotency_keys_are_unique_uuids() {
        let first = idempotency_key();
        let second = idempotency_key();
        assert_ne!(first, second);

        for key in [&first, &second] {
            assert_eq!(key.len(), 36);
            assert_eq!(key, &key.to_ascii_lowercase());
            let uuid = Uuid::parse_str(key).expect("uuid key");
            assert_eq!(uuid.get_version_num(), 4);
            assert_eq!(&key[14..15], "4");
            assert!(matches!(&key[19..20], "8" | "9" | "a" | "b"), "variant nibble in {key}");
        }
    }
}
