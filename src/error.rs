//! Error types surfaced at the driver's public boundary.
//!
//! Per the protocol design, parse and state errors are never exceptions —
//! they are recovered locally and turned into a reply on the wire (see
//! `command::ParsedLine::err` and the reply codes in `session`). `SessionError`
//! only covers the handful of things that are genuinely fatal to a connection:
//! stream I/O, a deadline elapsing, or a failed TLS handshake.

use std::io;

use thiserror::Error;

/// Fatal errors that can terminate a session's underlying I/O.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("deadline elapsed")]
    Timeout,

    #[error("tls handshake failed: {0}")]
    TlsHandshake(#[source] io::Error),

    #[error("input exceeded the configured byte cap")]
    InputTooLarge,
}

impl From<tokio::time::error::Elapsed> for SessionError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SessionError::Timeout
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
