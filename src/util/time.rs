//! Timestamp comparison rules used by the reconciler and the auditor.

use chrono::{DateTime, Timelike, Utc};

/// Revision ordering for optional `updated` timestamps: `None` is never
/// after anything, any `Some` is after `None`.
pub fn is_first_after_second(first: Option<DateTime<Utc>>, second: Option<DateTime<Utc>>) -> bool {
    match (first, second) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(a), Some(b)) => a > b,
    }
}

/// Equality with minutes, seconds and sub-seconds zeroed out. Feeds that
/// republish an entry with a slightly shifted publish time still compare
/// equal within the same hour.
pub fn eq_ignoring_mins_secs(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => truncate_to_hour(a) == truncate_to_hour(b),
        _ => false,
    }
}

fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}
