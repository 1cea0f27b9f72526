//! Expiration heuristics
//!
//! Panels report expiry under different field names and in different
//! formats: Unix seconds, Unix milliseconds, RFC 3339, or formatted date
//! strings. These helpers implement the observed fallback behavior; treat
//! them as best-available heuristics, not a documented panel contract.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use streampanel_connector::types::PanelAccountInfo;

/// Threshold above which a numeric timestamp is read as milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Interpret one loosely-typed expiration value.
///
/// Numbers and numeric strings are Unix timestamps (milliseconds when large
/// enough); other strings are tried as RFC 3339, then `%Y-%m-%d %H:%M:%S`,
/// then a bare date.
#[must_use]
pub fn parse_expiration(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(from_unix),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ts) = s.parse::<i64>() {
                return from_unix(ts);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
            }
            None
        }
        _ => None,
    }
}

fn from_unix(timestamp: i64) -> Option<DateTime<Utc>> {
    if timestamp <= 0 {
        return None;
    }
    if timestamp >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(timestamp)
    } else {
        DateTime::from_timestamp(timestamp, 0)
    }
}

/// Expiration from a panel account lookup, trying the fields in the observed
/// priority order: `expiration`, then `expiry_date`, then `exp`.
#[must_use]
pub fn expiration_from_info(info: &PanelAccountInfo) -> Option<DateTime<Utc>> {
    [&info.expiration, &info.expiry_date, &info.exp]
        .into_iter()
        .filter_map(|field| field.as_ref())
        .find_map(parse_expiration)
}

/// Expiration computed from a package duration starting now.
#[must_use]
pub fn expiration_from_months(months: u32) -> Option<DateTime<Utc>> {
    Utc::now().checked_add_months(Months::new(months))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_unix_seconds() {
        let dt = parse_expiration(&json!(1_700_000_000)).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_unix_milliseconds() {
        let dt = parse_expiration(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_numeric_string() {
        let dt = parse_expiration(&json!("1700000000")).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_rfc3339() {
        let dt = parse_expiration(&json!("2026-01-02T03:04:05Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-02T03:04:05+00:00");
    }

    #[test]
    fn parses_formatted_datetime() {
        let dt = parse_expiration(&json!("2026-01-02 03:04:05")).unwrap();
        assert_eq!(dt.timestamp(), 1_767_323_045);
    }

    #[test]
    fn parses_bare_date() {
        let dt = parse_expiration(&json!("2026-01-02")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-01-02 00:00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_expiration(&json!("soon")).is_none());
        assert!(parse_expiration(&json!("")).is_none());
        assert!(parse_expiration(&json!(null)).is_none());
        assert!(parse_expiration(&json!(true)).is_none());
        assert!(parse_expiration(&json!(-5)).is_none());
    }

    #[test]
    fn info_field_priority() {
        let info = PanelAccountInfo {
            expiration: Some(json!(1_700_000_000)),
            expiry_date: Some(json!(1_600_000_000)),
            exp: Some(json!(1_500_000_000)),
            ..Default::default()
        };
        assert_eq!(
            expiration_from_info(&info).unwrap().timestamp(),
            1_700_000_000
        );

        let info = PanelAccountInfo {
            expiry_date: Some(json!(1_600_000_000)),
            exp: Some(json!(1_500_000_000)),
            ..Default::default()
        };
        assert_eq!(
            expiration_from_info(&info).unwrap().timestamp(),
            1_600_000_000
        );

        let info = PanelAccountInfo {
            exp: Some(json!(1_500_000_000)),
            ..Default::default()
        };
        assert_eq!(
            expiration_from_info(&info).unwrap().timestamp(),
            1_500_000_000
        );
    }

    #[test]
    fn unparseable_preferred_field_falls_through() {
        let info = PanelAccountInfo {
            expiration: Some(json!("soon")),
            expiry_date: Some(json!(1_600_000_000)),
            ..Default::default()
        };
        assert_eq!(
            expiration_from_info(&info).unwrap().timestamp(),
            1_600_000_000
        );
    }

    #[test]
    fn months_arithmetic_lands_in_future() {
        let dt = expiration_from_months(3).unwrap();
        assert!(dt > Utc::now());
    }
}
