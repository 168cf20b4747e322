//! The clock external collaborator: deadlines are measured by `tokio::time`,
//! but banner timestamps and `#` log markers need a real calendar time, which
//! is where this trait comes in.

use chrono::{DateTime, FixedOffset, Local};

/// Supplies the current time for banner timestamps and session log markers.
///
/// Exists as a trait, rather than calling `chrono::Local::now()` directly,
/// so tests can pin the clock and assert on exact banner/log text.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The default `Clock`, backed by the system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }
}

/// Formats a timestamp the way the greeting banner's `SayTime` option does:
/// RFC 1123 with a numeric zone offset, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub fn format_rfc1123z(ts: DateTime<FixedOffset>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S %z").to_string()
}

/// Formats a timestamp for the `#` session-lifecycle log line:
/// `2006-01-02 15:04:05 -0700`.
pub fn format_log_timestamp(ts: DateTime<FixedOffset>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc1123z_matches_expected_layout() {
        let ts = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap();
        assert_eq!(format_rfc1123z(ts), "Mon, 02 Jan 2006 15:04:05 -0700");
    }

    #[test]
    fn log_timestamp_matches_expected_layout() {
        let ts = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap();
        assert_eq!(format_log_timestamp(ts), "2006-01-02 15:04:05 -0700");
    }
}
