//! The session driver: the `next-event` loop, the caller
//! accept/reject/tempfail protocol, and the owned aggregate (stream, state,
//! limits, log sink, clock) that the rest of the crate's pure components
//! operate on.
//!
//! The command loop lives inside the driver rather than the caller, since
//! the driver must own `replied`/bad-command bookkeeping across several
//! internal-only commands (NOOP, RSET, HELP, VRFY, ...) before it ever
//! surfaces a `Command` event to the caller.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use crate::clock::{format_log_timestamp, format_rfc1123z, Clock, SystemClock};
use crate::command::{parse_line, CommandTag};
use crate::error::SessionResult;
use crate::limits::{SessionLimits, CMD_LINE_CAP};
use crate::logsink::{FacadeLogSink, LogSink, LogTag};
use crate::reader::{read_body, read_command_line};
use crate::state::{is_table_command, is_valid_in, next_state_on_accept, SessionState};
use crate::tls::{Conn, TlsProvider};
use crate::writer::write_reply;

/// The outcome of one `next_event` call.
#[derive(Debug)]
pub enum Event {
    /// One of the envelope-sequencing verbs (HELO/EHLO, MAIL FROM, RCPT TO,
    /// DATA) awaiting the caller's accept/reject/tempfail decision.
    Command { cmd: CommandTag, arg: String },
    /// The DATA body has been read in full; awaits `AcceptData`/`RejectData`
    /// (or the general `Accept`/`Reject`/`Tempfail`).
    GotData { body: Vec<u8> },
    /// The client issued QUIT and the session ended gracefully.
    Done,
    /// The session ended due to an I/O failure, a deadline, or a
    /// bad-command flood.
    Abort,
    /// A STARTTLS handshake failed; the session is also moving to `Abort`.
    TlsError,
}

/// Owns the connection and all per-session state for one SMTP conversation.
///
/// Generic over the underlying byte stream `S`; STARTTLS replaces the
/// *value* held (`Conn::Plain` → `Conn::Tls`) rather than the type
/// parameter, so a caller holds one concrete `Session<TcpStream>` (or
/// whatever duplex type it connects with) for the life of the connection.
pub struct Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    conn: Option<BufReader<Conn<S>>>,
    state: SessionState,
    next_state: SessionState,
    curcmd: CommandTag,
    pending_arg: String,
    awaiting_body: bool,
    replied: bool,
    bad_count: u32,
    tls_on: bool,
    cipher: Option<String>,
    limits: SessionLimits,
    tls_provider: Option<Arc<dyn TlsProvider<S>>>,
    log: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, limits: SessionLimits) -> Self {
        Session {
            conn: Some(BufReader::new(Conn::Plain(stream))),
            state: SessionState::Startup,
            next_state: SessionState::Startup,
            curcmd: CommandTag::NoCmd,
            pending_arg: String::new(),
            awaiting_body: false,
            replied: true,
            bad_count: 0,
            tls_on: false,
            cipher: None,
            limits,
            tls_provider: None,
            log: Arc::new(FacadeLogSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_tls_provider(mut self, provider: Arc<dyn TlsProvider<S>>) -> Self {
        self.tls_provider = Some(provider);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tls_on(&self) -> bool {
        self.tls_on
    }

    pub fn cipher_name(&self) -> Option<&str> {
        self.cipher.as_deref()
    }

    fn conn_mut(&mut self) -> &mut BufReader<Conn<S>> {
        self.conn.as_mut().expect("connection always present between calls")
    }

    async fn write(&mut self, code: u16, text: &str) -> SessionResult<()> {
        self.log.log(LogTag::Write, &format!("{code} {text}"));
        let (deadline, delay) = (self.limits.reply_out, self.limits.delay);
        write_reply(self.conn_mut(), code, text, deadline, delay).await
    }

    /// The main driver operation: advances the session by at most one
    /// caller-visible event.
    ///
    /// Never returns `Err`: a write failure is exactly as fatal to the
    /// session as a read failure or a deadline (§4.C, §7), so both collapse
    /// to the same `Ok(Event::Abort)` outcome rather than one surfacing as a
    /// protocol event and the other as an exception.
    pub async fn next_event(&mut self) -> SessionResult<Event> {
        match self.next_event_inner().await {
            Ok(event) => Ok(event),
            Err(err) => {
                self.log.log(LogTag::Event, &format!("i/o failure: {err}"));
                // A write failure inside an explicit accept/reject/tempfail
                // call (§4.C) already moved to `Abort` and logged the
                // session-end marker before propagating; don't double it.
                if self.state != SessionState::Abort {
                    self.state = SessionState::Abort;
                    self.log_session_end();
                }
                Ok(Event::Abort)
            }
        }
    }

    async fn next_event_inner(&mut self) -> SessionResult<Event> {
        // 1. Implicit accept: the caller left the previous event unanswered.
        if !self.replied && self.curcmd != CommandTag::NoCmd {
            self.accept().await?;
        }

        // 2. Banner.
        if self.state == SessionState::Startup {
            self.send_banner().await?;
            self.state = SessionState::Initial;
        }

        // 3. DATA body.
        if self.state == SessionState::Data {
            let body = match read_body(self.conn_mut(), self.limits.msg_size, self.limits.msg_input).await {
                Ok(body) => body,
                Err(_) => {
                    self.log.log(LogTag::Event, "body read failed");
                    self.state = SessionState::Abort;
                    self.log_session_end();
                    return Ok(Event::Abort);
                }
            };
            self.curcmd = CommandTag::Data;
            self.awaiting_body = true;
            self.next_state = SessionState::Helo;
            self.state = SessionState::PostData;
            self.replied = false;
            return Ok(Event::GotData { body });
        }

        // 4. Command loop.
        loop {
            if self.state == SessionState::Abort {
                return Ok(Event::Abort);
            }
            if self.state == SessionState::Quit {
                return Ok(Event::Done);
            }
            if self.bad_count > self.limits.bad_cmds {
                let _ = self.write(554, "Too many bad commands").await;
                self.state = SessionState::Abort;
                self.log_session_end();
                return Ok(Event::Abort);
            }

            let line = match read_command_line(self.conn_mut(), CMD_LINE_CAP, self.limits.cmd_input).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(_) => {
                    self.state = SessionState::Abort;
                    self.log_session_end();
                    return Ok(Event::Abort);
                }
            };
            self.log.log(LogTag::Read, &line);

            let parsed = parse_line(&line);

            if parsed.cmd == CommandTag::BadCmd {
                self.write(501, &format!("Bad: {}", parsed.err)).await?;
                self.bad_count += 1;
                continue;
            }

            if is_table_command(parsed.cmd) {
                if !is_valid_in(parsed.cmd, self.state) {
                    self.write(503, "Out of sequence command").await?;
                    continue;
                }
                if !parsed.err.is_empty() {
                    self.write(553, &format!("Garbled command: {}", parsed.err)).await?;
                    continue;
                }
                if parsed.cmd == CommandTag::RcptTo && parsed.arg.is_empty() {
                    self.write(550, "Bad address").await?;
                    continue;
                }
                if !parsed.params.is_empty() && self.limits.no_params && !is_allowed_mail_param(parsed.cmd, &parsed.params) {
                    self.write(504, "Command parameter not implemented").await?;
                    continue;
                }

                self.curcmd = parsed.cmd;
                self.pending_arg = parsed.arg.clone();
                self.awaiting_body = false;
                self.next_state = next_state_on_accept(parsed.cmd, self.state);
                self.replied = false;
                return Ok(Event::Command { cmd: parsed.cmd, arg: parsed.arg });
            }

            match parsed.cmd {
                CommandTag::Noop => {
                    self.write(250, "Okay").await?;
                }
                CommandTag::Rset => {
                    self.state = if self.state == SessionState::Initial {
                        SessionState::Initial
                    } else {
                        SessionState::Helo
                    };
                    self.write(250, "Okay").await?;
                }
                CommandTag::Quit => {
                    self.write(221, "Goodbye").await?;
                    self.state = SessionState::Quit;
                    self.log_session_end();
                    return Ok(Event::Done);
                }
                CommandTag::Help => {
                    self.write(
                        214,
                        "Commands: HELO EHLO MAIL RCPT DATA RSET NOOP QUIT HELP STARTTLS",
                    )
                    .await?;
                }
                CommandTag::StartTls => match self.handle_starttls().await? {
                    Some(event) => return Ok(event),
                    None => continue,
                },
                CommandTag::Vrfy | CommandTag::Expn | CommandTag::Auth => {
                    self.write(502, "Not supported").await?;
                    self.bad_count += 1;
                }
                _ => unreachable!("all remaining command tags are handled above"),
            }
        }

        if self.bad_count > self.limits.bad_cmds {
            let _ = self.write(554, "Too many bad commands").await;
            self.state = SessionState::Abort;
            self.log_session_end();
            return Ok(Event::Abort);
        }
        if self.state == SessionState::Quit {
            return Ok(Event::Done);
        }
        self.state = SessionState::Abort;
        self.log_session_end();
        Ok(Event::Abort)
    }

    async fn send_banner(&mut self) -> SessionResult<()> {
        let mut text = format!("{} {}", self.limits.local_name, self.limits.software_name);
        if self.limits.say_time {
            text.push(' ');
            text.push_str(&format_rfc1123z(self.clock.now()));
        }
        if !self.limits.announce.is_empty() {
            text.push('\n');
            text.push_str(&self.limits.announce);
        }
        self.log.log(
            LogTag::Session,
            &format!("session start {}", format_log_timestamp(self.clock.now())),
        );
        self.write(220, &text).await
    }

    async fn handle_starttls(&mut self) -> SessionResult<Option<Event>> {
        if self.tls_on || self.tls_provider.is_none() {
            self.write(502, "Not supported").await?;
            self.bad_count += 1;
            return Ok(None);
        }
        self.write(220, "Ready to start TLS").await?;

        let provider = self.tls_provider.clone().expect("checked above");
        // `BufReader::into_inner` drops any bytes buffered ahead of the
        // handshake, as the concurrency model requires: a pipelining client
        // must not have plaintext it sent after STARTTLS leak into the
        // encrypted session.
        let conn = self
            .conn
            .take()
            .expect("connection always present between calls")
            .into_inner();
        let Conn::Plain(stream) = conn else {
            unreachable!("STARTTLS is only reachable once, before tls_on is set");
        };

        let handshake = tokio::time::timeout(self.limits.tls_setup, provider.handshake(stream));
        match handshake.await {
            Ok(Ok(tls)) => {
                self.cipher = provider.cipher_name(&tls);
                self.conn = Some(BufReader::new(Conn::Tls(Box::new(tls))));
                self.tls_on = true;
                self.state = SessionState::Initial;
                self.log.log(LogTag::Event, "STARTTLS handshake completed");
                Ok(None)
            }
            Ok(Err(err)) => {
                self.log.log(LogTag::Event, &format!("STARTTLS handshake failed: {err}"));
                self.state = SessionState::Abort;
                self.log_session_end();
                Ok(Some(Event::TlsError))
            }
            Err(_elapsed) => {
                self.log.log(LogTag::Event, "STARTTLS handshake timed out");
                self.state = SessionState::Abort;
                self.log_session_end();
                Ok(Some(Event::TlsError))
            }
        }
    }

    /// Logs the `#` session-end marker once the driver has decided to stop.
    fn log_session_end(&self) {
        self.log.log(
            LogTag::Session,
            &format!("session end {}", format_log_timestamp(self.clock.now())),
        );
    }

    // --- Caller accept/reject/tempfail actions -----------------------------

    /// Accepts the pending event using the default reply text.
    pub async fn accept(&mut self) -> SessionResult<()> {
        if self.replied {
            return Ok(());
        }
        let (code, text) = self.default_accept_reply();
        self.finish_accept(code, &text).await
    }

    /// Accepts the pending event with caller-supplied reply text. For
    /// HELO/EHLO this falls back to `accept`, since the EHLO capability
    /// advertisement is structural, not freely overridable.
    pub async fn accept_msg(&mut self, text: &str) -> SessionResult<()> {
        if self.replied {
            return Ok(());
        }
        if matches!(self.curcmd, CommandTag::Helo | CommandTag::Ehlo) {
            return self.accept().await;
        }
        let code = match (self.curcmd, self.awaiting_body) {
            (CommandTag::Data, false) => 354,
            _ => 250,
        };
        self.finish_accept(code, text).await
    }

    /// Accepts a DATA body with a caller-supplied message id. A no-op unless
    /// the driver is currently awaiting a body reply.
    pub async fn accept_data(&mut self, id: &str) -> SessionResult<()> {
        if !self.awaiting_body || self.replied {
            return Ok(());
        }
        let text = format!("I've put it in a can called {id}");
        self.finish_accept(250, &text).await
    }

    /// Rejects the pending event with the default reply text.
    pub async fn reject(&mut self) -> SessionResult<()> {
        if self.replied {
            return Ok(());
        }
        let (code, text) = self.default_reject_reply();
        self.finish_reject(code, &text).await
    }

    /// Rejects the pending event with caller-supplied reply text.
    pub async fn reject_msg(&mut self, text: &str) -> SessionResult<()> {
        if self.replied {
            return Ok(());
        }
        let (code, _) = self.default_reject_reply();
        self.finish_reject(code, text).await
    }

    /// Rejects a DATA body with a caller-supplied message id. A no-op unless
    /// the driver is currently awaiting a body reply.
    pub async fn reject_data(&mut self, id: &str) -> SessionResult<()> {
        if !self.awaiting_body || self.replied {
            return Ok(());
        }
        let text = format!("Not put in a can called {id}");
        self.finish_reject(554, &text).await
    }

    /// Tempfails the pending event with the default reply text.
    pub async fn tempfail(&mut self) -> SessionResult<()> {
        if self.replied {
            return Ok(());
        }
        let (code, text) = self.default_tempfail_reply();
        self.finish_reject(code, &text).await
    }

    /// Tempfails the pending event with caller-supplied reply text.
    pub async fn tempfail_msg(&mut self, text: &str) -> SessionResult<()> {
        if self.replied {
            return Ok(());
        }
        let (code, _) = self.default_tempfail_reply();
        self.finish_reject(code, text).await
    }

    fn default_accept_reply(&self) -> (u16, String) {
        match (self.curcmd, self.awaiting_body) {
            (CommandTag::Helo, _) => (250, format!("{} Hello {}", self.limits.local_name, self.pending_arg)),
            (CommandTag::Ehlo, _) => (250, self.ehlo_capability_text()),
            (CommandTag::MailFrom, _) | (CommandTag::RcptTo, _) => {
                (250, "Okay, I'll believe you for now".to_string())
            }
            (CommandTag::Data, false) => (354, "Send away".to_string()),
            (CommandTag::Data, true) => (250, "I've put it in a can".to_string()),
            _ => (250, "Okay".to_string()),
        }
    }

    fn default_reject_reply(&self) -> (u16, String) {
        match self.curcmd {
            CommandTag::Helo | CommandTag::Ehlo => (550, "Access denied".to_string()),
            CommandTag::MailFrom => (550, "Sender rejected".to_string()),
            CommandTag::RcptTo => (550, "Recipient rejected".to_string()),
            CommandTag::Data => (554, "Transaction failed".to_string()),
            _ => (550, "Rejected".to_string()),
        }
    }

    fn default_tempfail_reply(&self) -> (u16, String) {
        match self.curcmd {
            CommandTag::Helo | CommandTag::Ehlo => (421, "Service not available".to_string()),
            _ => (450, "Requested action not taken".to_string()),
        }
    }

    fn ehlo_capability_text(&self) -> String {
        let mut lines = vec![format!("{} Hello {}", self.limits.local_name, self.pending_arg)];
        lines.push("8BITMIME".to_string());
        lines.push("PIPELINING".to_string());
        if self.tls_provider.is_some() && !self.tls_on {
            lines.push("STARTTLS".to_string());
        }
        lines.push("HELP".to_string());
        lines.join("\n")
    }

    async fn finish_accept(&mut self, code: u16, text: &str) -> SessionResult<()> {
        if let Err(err) = self.write(code, text).await {
            self.state = SessionState::Abort;
            self.log_session_end();
            return Err(err);
        }
        self.state = self.next_state;
        self.replied = true;
        self.curcmd = CommandTag::NoCmd;
        self.awaiting_body = false;
        Ok(())
    }

    async fn finish_reject(&mut self, code: u16, text: &str) -> SessionResult<()> {
        if let Err(err) = self.write(code, text).await {
            self.state = SessionState::Abort;
            self.log_session_end();
            return Err(err);
        }
        // Rejecting/tempfailing a DATA body still ends the transaction
        // (the envelope is spent either way); rejecting an envelope command
        // before the body leaves state untouched, per the state machine's
        // design — the caller owns clearing its own envelope bookkeeping.
        if self.awaiting_body {
            self.state = self.next_state;
        }
        self.replied = true;
        self.curcmd = CommandTag::NoCmd;
        self.awaiting_body = false;
        Ok(())
    }
}

fn is_allowed_mail_param(cmd: CommandTag, params: &str) -> bool {
    cmd == CommandTag::MailFrom
        && (params.eq_ignore_ascii_case("BODY=7BIT") || params.eq_ignore_ascii_case("BODY=8BITMIME"))
}
