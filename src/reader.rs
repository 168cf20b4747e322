//! The bounded line and body reader: two distinct operations, a capped
//! command-line read and a capped, dot-unstuffing body read. The cap and
//! deadline are installed fresh on each call rather than fixed once, so the
//! 2 KiB command cap and the much larger body cap never collide.
//!
//! Both operations read through `AsyncBufReadExt`'s `fill_buf`/`consume`
//! pair rather than one byte at a time off the raw `AsyncRead` trait,
//! matching the teacher's own `BufReader::read_line` idiom
//! (`smtp_protocol.rs::read_line`) — generalized here to track a running
//! byte cap against each buffered chunk instead of reading unbounded.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::{SessionError, SessionResult};

/// Reads a single CR-LF-terminated line, enforcing `cap` bytes and
/// `deadline`. Returns `Ok(None)` on a clean EOF before any byte of a new
/// line was read (the client closed the connection); any other failure —
/// the cap exhausted, the deadline firing, or a stream error — is an `Err`,
/// which the driver turns into an `Abort`.
pub async fn read_command_line<R>(
    reader: &mut R,
    cap: u64,
    deadline: Duration,
) -> SessionResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::time::timeout(deadline, read_capped_line(reader, cap)).await?
}

/// Mirrors `AsyncBufReadExt::read_until`'s own fill-then-consume loop, with
/// the byte cap checked against the running total after each buffered chunk
/// rather than only once the whole line has accumulated.
async fn read_capped_line<R>(reader: &mut R, cap: u64) -> SessionResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(SessionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-line",
                )))
            };
        }
        let newline_at = available.iter().position(|&b| b == b'\n');
        let take = newline_at.map(|pos| pos + 1).unwrap_or(available.len());
        buf.extend_from_slice(&available[..take]);
        reader.consume(take);
        if buf.len() as u64 > cap {
            return Err(SessionError::InputTooLarge);
        }
        if newline_at.is_some() {
            buf.pop(); // the '\n'
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
        }
    }
}

/// Reads a dot-terminated DATA body, enforcing `cap` bytes and `deadline`,
/// and transparently un-stuffing leading dots per RFC 5321 §4.5.2: a line
/// containing only `.` ends the body; a line beginning with `..` has one
/// dot stripped.
pub async fn read_body<R>(reader: &mut R, cap: u64, deadline: Duration) -> SessionResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::time::timeout(deadline, read_capped_body(reader, cap)).await?
}

async fn read_capped_body<R>(reader: &mut R, cap: u64) -> SessionResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut total: u64 = 0;
    loop {
        let mut line = Vec::new();
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Err(SessionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-body",
                )));
            }
            let newline_at = available.iter().position(|&b| b == b'\n');
            let take = newline_at.map(|pos| pos + 1).unwrap_or(available.len());
            line.extend_from_slice(&available[..take]);
            reader.consume(take);
            total += take as u64;
            if total > cap {
                return Err(SessionError::InputTooLarge);
            }
            if newline_at.is_some() {
                break;
            }
        }
        line.pop(); // the '\n'
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line == b"." {
            return Ok(body);
        }

        let unstuffed: &[u8] = if line.first() == Some(&b'.') && line.get(1) == Some(&b'.') {
            &line[1..]
        } else {
            &line
        };
        body.extend_from_slice(unstuffed);
        body.extend_from_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_one_line_without_terminator() {
        let mut input = Cursor::new(b"EHLO me\r\n".to_vec());
        let line = read_command_line(&mut input, 2048, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(line, Some("EHLO me".to_string()));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_none() {
        let mut input = Cursor::new(Vec::<u8>::new());
        let line = read_command_line(&mut input, 2048, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn exceeding_cap_is_an_error() {
        let mut input = Cursor::new(vec![b'a'; 100]);
        let err = read_command_line(&mut input, 10, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InputTooLarge));
    }

    #[tokio::test]
    async fn pipelined_lines_leave_the_second_command_buffered_for_the_next_read() {
        let mut input = Cursor::new(b"EHLO me\r\nMAIL FROM:<a@b>\r\n".to_vec());
        let first = read_command_line(&mut input, 2048, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(first, Some("EHLO me".to_string()));
        let second = read_command_line(&mut input, 2048, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(second, Some("MAIL FROM:<a@b>".to_string()));
    }

    #[tokio::test]
    async fn body_stops_at_lone_dot_and_preserves_crlf() {
        let mut input = Cursor::new(b"hi\r\n.\r\n".to_vec());
        let body = read_body(&mut input, 1024, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(body, b"hi\r\n");
    }

    #[tokio::test]
    async fn body_unstuffs_leading_double_dot() {
        let mut input = Cursor::new(b"..leading dot\r\n.\r\n".to_vec());
        let body = read_body(&mut input, 1024, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(body, b".leading dot\r\n");
    }

    #[tokio::test]
    async fn body_exceeding_cap_errors() {
        let mut input = Cursor::new(vec![b'a'; 50]);
        let err = read_body(&mut input, 10, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InputTooLarge));
    }
}
