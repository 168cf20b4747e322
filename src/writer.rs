//! The reply writer: renders and sends single- or multi-line SMTP replies,
//! with optional per-byte write pacing for slowing down abusive clients.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::SessionResult;

/// Writes a single- or multi-line SMTP reply: `code` followed by `text`,
/// split on embedded `\n` into `code-text` continuation lines with a final
/// `code text` line. Trailing whitespace and blank lines are trimmed before
/// splitting.
///
/// When `delay` is non-zero, bytes are written one at a time with a sleep of
/// `delay` between them, and the effective deadline becomes
/// `deadline + delay * byte_count`.
pub async fn write_reply<W>(
    writer: &mut W,
    code: u16,
    text: &str,
    deadline: Duration,
    delay: Duration,
) -> SessionResult<()>
where
    W: AsyncWrite + Unpin,
{
    let rendered = render_reply(code, text);
    let effective_deadline = if delay.is_zero() {
        deadline
    } else {
        deadline + delay * rendered.len() as u32
    };

    let fut = async {
        if delay.is_zero() {
            writer.write_all(rendered.as_bytes()).await?;
        } else {
            for byte in rendered.as_bytes() {
                writer.write_all(std::slice::from_ref(byte)).await?;
                tokio::time::sleep(delay).await;
            }
        }
        writer.flush().await?;
        Ok(())
    };

    tokio::time::timeout(effective_deadline, fut).await?
}

/// Renders a reply to its wire form without writing it, for tests and logging.
///
/// Only *trailing* whitespace/blank lines are trimmed before splitting; a
/// blank line in the middle of caller-supplied text (e.g. a two-paragraph
/// rejection reason) is preserved as an empty `NNN-` continuation.
pub fn render_reply(code: u16, text: &str) -> String {
    let trimmed = text.trim_end();
    let lines: Vec<&str> = if trimmed.is_empty() {
        vec![""]
    } else {
        trimmed.lines().collect()
    };

    let mut out = String::new();
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        let sep = if i == last { ' ' } else { '-' };
        out.push_str(&format!("{code}{sep}{line}\r\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_reply_uses_space_separator() {
        assert_eq!(render_reply(250, "Okay"), "250 Okay\r\n");
    }

    #[test]
    fn multi_line_reply_dashes_all_but_last() {
        let rendered = render_reply(250, "mail.example\n8BITMIME\nPIPELINING\nHELP");
        assert_eq!(
            rendered,
            "250-mail.example\r\n250-8BITMIME\r\n250-PIPELINING\r\n250 HELP\r\n"
        );
    }

    #[test]
    fn trailing_blank_lines_are_trimmed() {
        let rendered = render_reply(221, "Goodbye\n\n");
        assert_eq!(rendered, "221 Goodbye\r\n");
    }

    #[test]
    fn blank_line_in_the_middle_of_the_text_is_preserved() {
        let rendered = render_reply(550, "first paragraph\n\nsecond paragraph");
        assert_eq!(
            rendered,
            "550-first paragraph\r\n550-\r\n550 second paragraph\r\n"
        );
    }

    #[tokio::test]
    async fn write_reply_flushes_bytes_to_the_stream() {
        let mut buf = Vec::new();
        write_reply(&mut buf, 220, "Ready", Duration::from_secs(1), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(buf, b"220 Ready\r\n");
    }
}
