//! The command parser (pure, no I/O): a table over all fourteen SMTP verbs
//! and their four argument policies, rather than a chain of per-verb
//! `starts_with` checks.

/// The closed set of recognized SMTP verbs, plus `BadCmd` for anything that
/// failed to parse and `NoCmd` as the "nothing issued yet" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandTag {
    #[default]
    NoCmd,
    BadCmd,
    Helo,
    Ehlo,
    MailFrom,
    RcptTo,
    Data,
    Quit,
    Rset,
    Noop,
    Vrfy,
    Expn,
    Help,
    Auth,
    StartTls,
}

/// How a command's trailing text is validated and captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgPolicy {
    /// Any trailing text is an error.
    NoArg,
    /// Trailing text is optional; captured verbatim if present.
    CanArg,
    /// Trailing text is required (at least one non-whitespace character).
    MustArg,
    /// `VERB:<addr>[ params]`, the `MAIL FROM` / `RCPT TO` special form.
    ColonAddress,
}

struct TableEntry {
    verb: &'static str,
    cmd: CommandTag,
    policy: ArgPolicy,
}

const TABLE: &[TableEntry] = &[
    TableEntry { verb: "MAIL FROM", cmd: CommandTag::MailFrom, policy: ArgPolicy::ColonAddress },
    TableEntry { verb: "RCPT TO", cmd: CommandTag::RcptTo, policy: ArgPolicy::ColonAddress },
    TableEntry { verb: "HELO", cmd: CommandTag::Helo, policy: ArgPolicy::MustArg },
    TableEntry { verb: "EHLO", cmd: CommandTag::Ehlo, policy: ArgPolicy::MustArg },
    TableEntry { verb: "DATA", cmd: CommandTag::Data, policy: ArgPolicy::NoArg },
    TableEntry { verb: "QUIT", cmd: CommandTag::Quit, policy: ArgPolicy::NoArg },
    TableEntry { verb: "RSET", cmd: CommandTag::Rset, policy: ArgPolicy::NoArg },
    TableEntry { verb: "NOOP", cmd: CommandTag::Noop, policy: ArgPolicy::CanArg },
    TableEntry { verb: "VRFY", cmd: CommandTag::Vrfy, policy: ArgPolicy::MustArg },
    TableEntry { verb: "EXPN", cmd: CommandTag::Expn, policy: ArgPolicy::MustArg },
    TableEntry { verb: "HELP", cmd: CommandTag::Help, policy: ArgPolicy::CanArg },
    TableEntry { verb: "AUTH", cmd: CommandTag::Auth, policy: ArgPolicy::CanArg },
    TableEntry { verb: "STARTTLS", cmd: CommandTag::StartTls, policy: ArgPolicy::NoArg },
];

/// The result of parsing one CR-LF-stripped command line.
///
/// `cmd` is set even on error (it may be `BadCmd`); `err` is empty on
/// success and a short human-readable message otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLine {
    pub cmd: CommandTag,
    pub arg: String,
    pub params: String,
    pub err: String,
}

/// Parses a single command line (CR-LF already stripped) into a `ParsedLine`.
pub fn parse_line(line: &str) -> ParsedLine {
    if line.bytes().any(|b| b >= 0x80) {
        return ParsedLine {
            cmd: CommandTag::BadCmd,
            arg: String::new(),
            params: String::new(),
            err: "command contains non 7-bit ASCII".to_string(),
        };
    }

    let upper = line.to_ascii_uppercase();

    // Point 3: a verb matches only if the line ends exactly at the verb, or
    // the following character is SP or `:`. This holds uniformly for every
    // policy, including colonAddress — whether the `:` is actually present
    // is checked separately, by `parse_colon_address`, so that a malformed
    // `MAIL FROM` (missing its colon) still yields a known `cmd` with a
    // garbled-argument error rather than falling through to `BadCmd`.
    let matched = TABLE.iter().find(|entry| {
        if !upper.starts_with(entry.verb) {
            return false;
        }
        let rest = &line[entry.verb.len()..];
        rest.is_empty() || rest.starts_with(' ') || rest.starts_with(':')
    });

    let Some(entry) = matched else {
        return ParsedLine {
            cmd: CommandTag::BadCmd,
            arg: String::new(),
            params: String::new(),
            err: "unrecognized command".to_string(),
        };
    };

    let rest = &line[entry.verb.len()..];

    match entry.policy {
        ArgPolicy::NoArg => {
            if rest.trim().is_empty() {
                ParsedLine {
                    cmd: entry.cmd,
                    arg: String::new(),
                    params: String::new(),
                    err: String::new(),
                }
            } else {
                ParsedLine {
                    cmd: entry.cmd,
                    arg: String::new(),
                    params: String::new(),
                    err: "SMTP command does not take an argument".to_string(),
                }
            }
        }
        ArgPolicy::CanArg => ParsedLine {
            cmd: entry.cmd,
            arg: rest.trim().to_string(),
            params: String::new(),
            err: String::new(),
        },
        ArgPolicy::MustArg => {
            let trimmed = rest.trim();
            if trimmed.is_empty() {
                ParsedLine {
                    cmd: entry.cmd,
                    arg: String::new(),
                    params: String::new(),
                    err: "SMTP command requires an argument".to_string(),
                }
            } else {
                ParsedLine {
                    cmd: entry.cmd,
                    arg: trimmed.to_string(),
                    params: String::new(),
                    err: String::new(),
                }
            }
        }
        ArgPolicy::ColonAddress => parse_colon_address(entry.cmd, rest),
    }
}

/// Parses the `:<addr>[ params]` tail shared by `MAIL FROM` and `RCPT TO`.
///
/// `rest` is everything after the verb; the verb-matching pass (point 3 of
/// the grammar) only guarantees it is empty or starts with SP or `:`, not
/// that the colon is actually there.
fn parse_colon_address(cmd: CommandTag, rest: &str) -> ParsedLine {
    let Some(after_colon) = rest.strip_prefix(':') else {
        return ParsedLine {
            cmd,
            arg: String::new(),
            params: String::new(),
            err: "improper argument formatting".to_string(),
        };
    };
    // RFC 5321 forbids the space before `<`, but many clients send one; accept it.
    let after_colon = after_colon.strip_prefix(' ').unwrap_or(after_colon);

    let bad = |msg: &str| ParsedLine {
        cmd,
        arg: String::new(),
        params: String::new(),
        err: msg.to_string(),
    };

    let Some(body) = after_colon.strip_prefix('<') else {
        return bad("improper argument formatting");
    };

    // The terminator is the trailing `>` if the line ends with one; otherwise
    // the first `>`, which must then be followed by a space introducing
    // ESMTP parameters.
    if let Some(stripped) = body.strip_suffix('>') {
        return ParsedLine {
            cmd,
            arg: stripped.to_string(),
            params: String::new(),
            err: String::new(),
        };
    }

    match body.find('>') {
        Some(idx) => {
            let addr = &body[..idx];
            let after = &body[idx + 1..];
            if !after.starts_with(' ') {
                return bad("improper argument formatting");
            }
            ParsedLine {
                cmd,
                arg: addr.to_string(),
                params: after.trim().to_string(),
                err: String::new(),
            }
        }
        None => bad("improper argument formatting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_ascii() {
        let parsed = parse_line("HELO caf\u{e9}");
        assert_eq!(parsed.cmd, CommandTag::BadCmd);
        assert_eq!(parsed.err, "command contains non 7-bit ASCII");
    }

    #[test]
    fn no_arg_command_with_trailing_text_is_an_error_but_cmd_is_set() {
        let parsed = parse_line("QUIT now");
        assert_eq!(parsed.cmd, CommandTag::Quit);
        assert!(!parsed.err.is_empty());
    }

    #[test]
    fn mail_from_extracts_address_and_empty_params() {
        let parsed = parse_line("MAIL FROM:<a@b>");
        assert_eq!(parsed.cmd, CommandTag::MailFrom);
        assert_eq!(parsed.arg, "a@b");
        assert_eq!(parsed.params, "");
        assert!(parsed.err.is_empty());
    }

    #[test]
    fn rcpt_to_rejects_embedded_gt_terminator_without_following_space() {
        let parsed = parse_line("RCPT TO:<a@b>junk");
        assert_eq!(parsed.cmd, CommandTag::RcptTo);
        assert!(!parsed.err.is_empty());
    }

    #[test]
    fn colon_space_tolerance() {
        let parsed = parse_line("MAIL FROM: <x@y>");
        assert_eq!(parsed.cmd, CommandTag::MailFrom);
        assert_eq!(parsed.arg, "x@y");
        assert_eq!(parsed.params, "");
    }

    #[test]
    fn null_sender_is_legal_empty_arg() {
        let parsed = parse_line("MAIL FROM:<>");
        assert_eq!(parsed.cmd, CommandTag::MailFrom);
        assert_eq!(parsed.arg, "");
        assert!(parsed.err.is_empty());
    }

    #[test]
    fn esmtp_params_captured_after_gt_space() {
        let parsed = parse_line("MAIL FROM:<a@b> BODY=8BITMIME");
        assert_eq!(parsed.arg, "a@b");
        assert_eq!(parsed.params, "BODY=8BITMIME");
    }

    #[test]
    fn mail_from_missing_colon_is_a_garbled_known_command_not_bad_cmd() {
        // The verb itself matches (followed by SP); the missing `:` is a
        // grammar violation on a recognized command, not an unknown verb.
        let parsed = parse_line("MAIL FROM a@b");
        assert_eq!(parsed.cmd, CommandTag::MailFrom);
        assert_eq!(parsed.err, "improper argument formatting");
    }

    #[test]
    fn unrecognized_verb_is_bad_cmd() {
        let parsed = parse_line("GIBBERISH");
        assert_eq!(parsed.cmd, CommandTag::BadCmd);
        assert_eq!(parsed.err, "unrecognized command");
    }

    #[test]
    fn verb_must_end_exactly_or_be_followed_by_sp_or_colon() {
        // "HELPME" should not match "HELP".
        let parsed = parse_line("HELPME");
        assert_eq!(parsed.cmd, CommandTag::BadCmd);
    }

    #[test]
    fn helo_requires_argument() {
        let parsed = parse_line("HELO");
        assert_eq!(parsed.cmd, CommandTag::Helo);
        assert_eq!(parsed.err, "SMTP command requires an argument");
    }
}
