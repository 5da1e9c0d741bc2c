//! Date sanity correction against the archive bucket.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::model::bucket::Bucket;
pub use crate::model::document::DateCorrection;

/// How far outside its bucket a date may fall and still be trusted.
pub const GRACE_DAYS: i64 = 3;

/// Clamp `date` into the window of `bucket`.
///
/// Dates within [`GRACE_DAYS`] of the bucket are kept as they are. Earlier or
/// missing dates become the first instant of the bucket, later ones its last
/// second. Every correction is logged at info level; `key` labels the line.
pub fn correct_date(
    date: Option<DateTime<Utc>>,
    bucket: &Bucket,
    key: &str,
) -> (DateTime<Utc>, DateCorrection) {
    let grace = Duration::days(GRACE_DAYS);
    let start = bucket.start();
    let next = bucket.next_start();

    match date {
        Some(d) if d >= start - grace && d <= next + grace => (d, DateCorrection::Kept),
        Some(d) if d > next + grace => {
            info!(key, date = %d, bucket = %bucket, "Date after bucket, clamping to its end");
            (next - Duration::seconds(1), DateCorrection::TooLate)
        }
        Some(d) => {
            info!(key, date = %d, bucket = %bucket, "Date before bucket, clamping to its start");
            (start, DateCorrection::TooEarly)
        }
        None => {
            info!(key, bucket = %bucket, "No usable date, using bucket start");
            (start, DateCorrection::Missing)
        }
    }
}
