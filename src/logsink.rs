//! The logger sink external collaborator: an append-only trace of raw
//! SMTP lines and lifecycle markers, tagged `r`/`w`/`!`/`#`.
//!
//! Logging is a trait rather than direct `log` calls so a caller wanting an
//! audit-grade transcript can supply its own sink, while still getting free
//! wire-level tracing through the `log` facade via the default sink.

/// Tags a logged line by what kind of event it records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    /// `r` — a line read from the client.
    Read,
    /// `w` — a line written to the client.
    Write,
    /// `!` — an error or TLS event.
    Event,
    /// `#` — a session start/end marker.
    Session,
}

impl LogTag {
    fn as_char(self) -> char {
        match self {
            LogTag::Read => 'r',
            LogTag::Write => 'w',
            LogTag::Event => '!',
            LogTag::Session => '#',
        }
    }
}

/// An append-only sink for the session's raw-line trace.
///
/// Implementations must not block the async runtime; a sink that needs to do
/// real I/O (writing to a file, shipping to a log aggregator) should buffer
/// and flush on its own schedule rather than synchronously blocking `log`.
pub trait LogSink: Send + Sync {
    fn log(&self, tag: LogTag, text: &str);
}

/// Forwards every tagged line to the `log` facade. `Read`/`Write` lines go to
/// `trace!` (high-volume wire detail); `Event` and `Session` markers go to
/// `debug!`, matching the level lifecycle events are normally logged at.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogSink;

impl LogSink for FacadeLogSink {
    fn log(&self, tag: LogTag, text: &str) {
        match tag {
            LogTag::Read | LogTag::Write => {
                log::trace!("{} {}", tag.as_char(), text);
            }
            LogTag::Event | LogTag::Session => {
                log::debug!("{} {}", tag.as_char(), text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(LogTag, String)>>);

    impl LogSink for RecordingSink {
        fn log(&self, tag: LogTag, text: &str) {
            self.0.lock().unwrap().push((tag, text.to_string()));
        }
    }

    #[test]
    fn recording_sink_captures_tagged_lines() {
        let sink = RecordingSink::default();
        sink.log(LogTag::Read, "EHLO me");
        sink.log(LogTag::Write, "250 Okay");
        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded[0], (LogTag::Read, "EHLO me".to_string()));
        assert_eq!(recorded[1], (LogTag::Write, "250 Okay".to_string()));
    }
}
