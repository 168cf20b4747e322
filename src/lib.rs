//! A reusable SMTP conversation engine.
//!
//! This crate is the server-side protocol core of an SMTP daemon: it reads
//! client commands off a byte stream, validates command syntax and
//! sequencing per RFC 5321 (plus the 8BITMIME, PIPELINING, and STARTTLS
//! extensions), negotiates an in-band TLS upgrade, and surfaces a small
//! event stream — session start, envelope commands, the message body,
//! termination — to a caller.
//!
//! The caller owns everything this crate deliberately does not: accepting
//! network connections, loading configuration, and deciding which senders,
//! recipients, and messages to accept. Call [`Session::next_event`] in a
//! loop, respond to each [`Event::Command`]/[`Event::GotData`] with
//! [`Session::accept`]/[`Session::reject`]/[`Session::tempfail`] (or leave it
//! unanswered — the driver auto-accepts before returning the next event),
//! and stop when you see [`Event::Done`], [`Event::Abort`], or
//! [`Event::TlsError`].

pub mod clock;
pub mod command;
pub mod error;
pub mod limits;
pub mod logsink;
pub mod reader;
pub mod session;
pub mod state;
pub mod tls;
pub mod writer;

pub use clock::{Clock, SystemClock};
pub use command::CommandTag;
pub use error::{SessionError, SessionResult};
pub use limits::SessionLimits;
pub use logsink::{LogSink, LogTag};
pub use session::{Event, Session};
pub use state::SessionState;
pub use tls::{RustlsTlsProvider, TlsProvider};
