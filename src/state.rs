//! The session state machine (pure).
//!
//! Only the envelope-sequencing commands (HELO/EHLO, MAIL FROM, RCPT TO, DATA)
//! have an entry here; every other command is "valid in all states" and
//! handled inline by the driver (`session.rs`), per the protocol design.

use crate::command::CommandTag;

/// The nine states a session can be in. `Startup` is pre-banner; `PostData`
/// is the synthetic state between a DATA body being read and the caller
/// replying to it; `Quit` and `Abort` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Startup,
    Initial,
    Helo,
    Mail,
    Rcpt,
    Data,
    PostData,
    Quit,
    Abort,
}

/// Whether `cmd` is one of the four envelope-sequencing commands this state
/// machine governs. Everything else (NOOP, RSET, QUIT, HELP, STARTTLS,
/// VRFY/EXPN/AUTH) is "valid in all states" and not covered by this table.
pub fn is_table_command(cmd: CommandTag) -> bool {
    matches!(
        cmd,
        CommandTag::Helo | CommandTag::Ehlo | CommandTag::MailFrom | CommandTag::RcptTo | CommandTag::Data
    )
}

/// Is `cmd` valid to issue from `state`? Only meaningful for table commands;
/// callers must check `is_table_command` first.
pub fn is_valid_in(cmd: CommandTag, state: SessionState) -> bool {
    match cmd {
        CommandTag::Helo | CommandTag::Ehlo => matches!(state, SessionState::Initial | SessionState::Helo),
        CommandTag::MailFrom => matches!(state, SessionState::Helo),
        CommandTag::RcptTo => matches!(state, SessionState::Mail | SessionState::Rcpt),
        CommandTag::Data => matches!(state, SessionState::Rcpt),
        _ => false,
    }
}

/// The state a session moves to when `cmd` (issued from `state`) is
/// accepted. Only meaningful for table commands.
pub fn next_state_on_accept(cmd: CommandTag, state: SessionState) -> SessionState {
    match cmd {
        CommandTag::Helo | CommandTag::Ehlo => SessionState::Helo,
        CommandTag::MailFrom => SessionState::Mail,
        CommandTag::RcptTo => SessionState::Rcpt,
        CommandTag::Data => SessionState::Data,
        _ => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helo_valid_only_from_initial_or_helo() {
        assert!(is_valid_in(CommandTag::Helo, SessionState::Initial));
        assert!(is_valid_in(CommandTag::Helo, SessionState::Helo));
        assert!(!is_valid_in(CommandTag::Helo, SessionState::Mail));
        assert!(!is_valid_in(CommandTag::Helo, SessionState::Rcpt));
    }

    #[test]
    fn rcpt_to_valid_from_mail_or_rcpt() {
        assert!(is_valid_in(CommandTag::RcptTo, SessionState::Mail));
        assert!(is_valid_in(CommandTag::RcptTo, SessionState::Rcpt));
        assert!(!is_valid_in(CommandTag::RcptTo, SessionState::Helo));
    }

    #[test]
    fn data_valid_only_from_rcpt() {
        assert!(is_valid_in(CommandTag::Data, SessionState::Rcpt));
        assert!(!is_valid_in(CommandTag::Data, SessionState::Mail));
    }

    #[test]
    fn next_state_table_matches_accept_transitions() {
        assert_eq!(next_state_on_accept(CommandTag::Helo, SessionState::Initial), SessionState::Helo);
        assert_eq!(next_state_on_accept(CommandTag::MailFrom, SessionState::Helo), SessionState::Mail);
        assert_eq!(next_state_on_accept(CommandTag::RcptTo, SessionState::Mail), SessionState::Rcpt);
        assert_eq!(next_state_on_accept(CommandTag::Data, SessionState::Rcpt), SessionState::Data);
    }

    #[test]
    fn noop_and_friends_are_not_table_commands() {
        assert!(!is_table_command(CommandTag::Noop));
        assert!(!is_table_command(CommandTag::Rset));
        assert!(!is_table_command(CommandTag::Quit));
        assert!(!is_table_command(CommandTag::StartTls));
    }
}
