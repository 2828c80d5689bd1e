// crates/fitstore/src/db/migration/transform.rs
// Built-in row transforms used by table rebuilds

use chrono::{DateTime, NaiveDate};
use rusqlite::types::Value;

/// Convert a stored date into epoch seconds.
///
/// Accepts `YYYY-MM-DD` (interpreted as UTC midnight) and RFC 3339 timestamps.
/// NULL stays NULL. Every other value is rejected and aborts the step,
/// integers included: a bare number such as `20240110` could be a packed
/// date or epoch seconds, and guessing would store a wrong instant.
pub fn iso_date_to_epoch_seconds(value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Integer(n) => Err(format!("expected a date string, found the INTEGER {n}")),
        Value::Text(text) => {
            let trimmed = text.trim();
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                let midnight = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| format!("invalid calendar date {trimmed:?}"))?;
                return Ok(Value::Integer(midnight.and_utc().timestamp()));
            }
            DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| Value::Integer(dt.timestamp()))
                .map_err(|_| format!("unparsable date {trimmed:?}"))
        }
        Value::Real(_) => Err("expected a date string, found a REAL value".to_string()),
        Value::Blob(_) => Err("expected a date string, found a BLOB value".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_date_utc_midnight() {
        assert_eq!(
            iso_date_to_epoch_seconds(&Value::Text("2024-01-15".into())).unwrap(),
            Value::Integer(1_705_276_800)
        );
        assert_eq!(
            iso_date_to_epoch_seconds(&Value::Text("2024-01-10".into())).unwrap(),
            Value::Integer(1_704_844_800)
        );
    }

    #[test]
    fn test_rfc3339_with_offset() {
        assert_eq!(
            iso_date_to_epoch_seconds(&Value::Text("2024-01-10T02:00:00+02:00".into())).unwrap(),
            Value::Integer(1_704_844_800)
        );
    }

    #[test]
    fn test_null_passes_through() {
        assert_eq!(iso_date_to_epoch_seconds(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_integer_dates_rejected() {
        let err = iso_date_to_epoch_seconds(&Value::Integer(20_240_110)).unwrap_err();
        assert!(err.contains("20240110"));
        assert!(iso_date_to_epoch_seconds(&Value::Integer(1_704_844_800)).is_err());
    }

    #[test]
    fn test_unparsable_rejected() {
        let err = iso_date_to_epoch_seconds(&Value::Text("yesterday".into())).unwrap_err();
        assert!(err.contains("yesterday"));
        assert!(iso_date_to_epoch_seconds(&Value::Text("2024-02-30".into())).is_err());
        assert!(iso_date_to_epoch_seconds(&Value::Real(1.5)).is_err());
    }
}
