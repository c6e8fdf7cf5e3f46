//! Hour-bucket row keys

use chrono::{DateTime, Utc};

/// `{sensor_id}#{YYYY-MM-DDTHH}` for the UTC hour containing `at`.
pub fn row_key(sensor_id: &str, at: DateTime<Utc>) -> String {
    format!("{}#{}", sensor_id, at.format("%Y-%m-%dT%H"))
}

/// Buckets covering `[start, end]`, sorted and deduplicated. A window of at
/// most one hour touches at most two buckets.
pub fn bucket_keys(sensor_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
    let mut keys = vec![row_key(sensor_id, start), row_key(sensor_id, end)];
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_hour_boundaries() {
        let before = Utc.with_ymd_and_hms(2024, 3, 1, 9, 59, 59).unwrap();
        let on = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(row_key("S-1", before), "S-1#2024-03-01T09");
        assert_eq!(row_key("S-1", on), "S-1#2024-03-01T10");
        assert_eq!(
            row_key("S-1", before + Duration::milliseconds(999)),
            "S-1#2024-03-01T09"
        );
    }

    #[test]
    fn test_day_rollover() {
        let at = Utc.with_ymd_and_hms(2023, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(row_key("S", at + Duration::hours(1)), "S#2024-01-01T00");
    }

    #[test]
    fn test_bucket_keys_span_one_or_two_hours() {
        let on_hour = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let keys = bucket_keys("S", on_hour - Duration::hours(1), on_hour);
        assert_eq!(keys, vec!["S#2024-03-01T09", "S#2024-03-01T10"]);

        let keys = bucket_keys("S", on_hour, on_hour + Duration::minutes(30));
        assert_eq!(keys, vec!["S#2024-03-01T10"]);
    }
}
