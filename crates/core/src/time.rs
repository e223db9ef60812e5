use chrono::{DateTime, DurationRound, Utc};

use crate::error::{Result, TracedeckError};
use crate::window::Bucket;

/// Floor a timestamp to the start of its bucket.
pub fn floor_to_bucket(ts: DateTime<Utc>, bucket: Bucket) -> Result<DateTime<Utc>> {
    ts.duration_trunc(bucket.step())
        .map_err(|e| TracedeckError::Internal(format!("bucket floor failed: {e}")))
}

/// The bucket key string for a timestamp, matching the keys the
/// analytics queries emit.
pub fn bucket_key(ts: DateTime<Utc>, bucket: Bucket) -> String {
    ts.format(bucket.key_format()).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn floors_to_minute_and_hour() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 10, 37, 42).unwrap();
        assert_eq!(
            floor_to_bucket(ts, Bucket::Minute).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 10, 37, 0).unwrap()
        );
        assert_eq!(
            floor_to_bucket(ts, Bucket::Hour).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn bucket_keys_are_sortable_strings() {
        let early = Utc.with_ymd_and_hms(2026, 2, 1, 9, 59, 10).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 5).unwrap();
        let a = bucket_key(early, Bucket::Minute);
        let b = bucket_key(late, Bucket::Minute);
        assert_eq!(a, "2026-02-01 09:59:00");
        assert_eq!(b, "2026-02-01 10:00:00");
        assert!(a < b);
    }
}
