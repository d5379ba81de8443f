//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Format used for `extracted_at` and failure timestamps in the JSON outputs
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current local wall-clock time as `YYYY-MM-DD HH:MM:SS`
pub fn local_timestamp() -> String {
    Local::now().format(LOCAL_TIMESTAMP_FORMAT).to_string()
}

/// Parse an RFC 3339 column value back into UTC
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
