//! RFC 3339 timestamp helpers with millisecond precision, per spec.md §3
//! ("All timestamps are RFC 3339 with millisecond precision").

use chrono::{DateTime, SecondsFormat, Utc};

/// The current instant, truncated to millisecond precision.
pub fn now_ms() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Format a timestamp as RFC 3339 with millisecond precision.
pub fn to_rfc3339_ms(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_millisecond_precision() {
        let ts = now_ms();
        let formatted = to_rfc3339_ms(&ts);
        assert!(formatted.ends_with('Z'));
        assert!(formatted.contains('.'));
    }
}
