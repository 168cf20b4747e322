//! Deadlines, byte caps, and the other tunables described in the component's
//! limits table. Loading these from the environment is a caller concern (see
//! `demos/daemon.rs`); this crate only provides the defaults and the struct.

use std::time::Duration;

/// Deadlines, size caps, and feature flags that bound a single session.
///
/// `Default` reproduces the reference defaults exactly: a 2 minute command
/// deadline, 10 minute body deadline, 2 minute reply deadline, 4 minute TLS
/// handshake deadline, a 5 MiB body cap, and tolerance for 5 bad commands
/// before the session is aborted.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Deadline for reading a single command line.
    pub cmd_input: Duration,
    /// Deadline for reading the full DATA body.
    pub msg_input: Duration,
    /// Deadline for writing a single reply.
    pub reply_out: Duration,
    /// Deadline for completing a STARTTLS handshake.
    pub tls_setup: Duration,
    /// Byte cap on the DATA body.
    pub msg_size: u64,
    /// Tolerated bad (unparseable/unsupported) commands before a 554 abort.
    pub bad_cmds: u32,
    /// Reject unrecognized MAIL FROM / RCPT TO parameters.
    pub no_params: bool,
    /// Per-byte write pacing; zero disables it.
    pub delay: Duration,
    /// Include an RFC1123Z timestamp in the greeting banner.
    pub say_time: bool,
    /// Hostname used in the banner and in replies that echo it.
    pub local_name: String,
    /// Software tag included in the greeting banner.
    pub software_name: String,
    /// Extra banner text appended after the greeting.
    pub announce: String,
}

impl Default for SessionLimits {
    fn default() -> Self {
        SessionLimits {
            cmd_input: Duration::from_secs(120),
            msg_input: Duration::from_secs(600),
            reply_out: Duration::from_secs(120),
            tls_setup: Duration::from_secs(240),
            msg_size: 5 * 1024 * 1024,
            bad_cmds: 5,
            no_params: true,
            delay: Duration::ZERO,
            say_time: false,
            local_name: "localhost".to_string(),
            software_name: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
            announce: String::new(),
        }
    }
}

/// Command read byte cap. Fixed per the protocol design, not user-tunable.
pub const CMD_LINE_CAP: u64 = 2048;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_table() {
        let limits = SessionLimits::default();
        assert_eq!(limits.cmd_input, Duration::from_secs(120));
        assert_eq!(limits.msg_input, Duration::from_secs(600));
        assert_eq!(limits.reply_out, Duration::from_secs(120));
        assert_eq!(limits.tls_setup, Duration::from_secs(240));
        assert_eq!(limits.msg_size, 5 * 1024 * 1024);
        assert_eq!(limits.bad_cmds, 5);
        assert!(limits.no_params);
        assert_eq!(limits.delay, Duration::ZERO);
        assert!(!limits.say_time);
        assert_eq!(limits.local_name, "localhost");
        assert_eq!(limits.announce, "");
    }
}
