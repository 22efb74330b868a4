//! Line framing shared by client and server.
//!
//! Two read modes exist because the request uses two framings: the header
//! and token are newline-terminated, the payload is bounded by end-of-stream.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::protocol::MAX_LINE_LENGTH;

/// Result of a single [`LineReader::read_line`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineReadOutcome {
    /// A complete line, newline stripped.
    Line(String),
    /// End-of-stream (or a read failure) before any newline. Carries the
    /// bytes accumulated so far, possibly empty.
    EndOfStream(String),
    /// `MAX_LINE_LENGTH` bytes arrived without a newline. They are dropped;
    /// the next read continues with the following byte.
    Truncated,
}

/// Buffered reader that serves both the line phase and the raw payload phase
/// from the same buffer.
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: BytesMut,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        LineReader {
            inner: BufReader::new(reader),
            line: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Read one line, byte by byte.
    pub async fn read_line(&mut self) -> LineReadOutcome {
        self.line.clear();

        while self.line.len() < MAX_LINE_LENGTH {
            let mut byte = [0u8; 1];
            match self.inner.read(&mut byte).await {
                Ok(0) => return LineReadOutcome::EndOfStream(self.take_text()),
                Ok(_) if byte[0] == b'\n' => return LineReadOutcome::Line(self.take_text()),
                Ok(_) => self.line.put_u8(byte[0]),
                Err(e) => {
                    debug!(error = %e, "Read failed, treating as end of stream");
                    return LineReadOutcome::EndOfStream(self.take_text());
                }
            }
        }

        self.line.clear();
        LineReadOutcome::Truncated
    }

    /// Read raw bytes until end-of-stream or `limit` bytes, whichever first.
    /// A read failure ends the read early with whatever was received.
    pub async fn read_to_end(&mut self, limit: usize) -> Bytes {
        let mut buf = Vec::with_capacity(limit);
        if let Err(e) = (&mut self.inner)
            .take(limit as u64)
            .read_to_end(&mut buf)
            .await
        {
            debug!(error = %e, received = buf.len(), "Payload read failed");
        }
        Bytes::from(buf)
    }

    fn take_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        text
    }
}

/// Write `text` followed by a newline.
pub async fn send_line<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Write `text` as-is, with no trailing newline.
pub async fn send_raw<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_lines() {
        let mock = Builder::new().read(b"first\nsec").read(b"ond\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::Line("first".to_string())
        );
        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::Line("second".to_string())
        );
        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::EndOfStream(String::new())
        );
    }

    #[tokio::test]
    async fn test_empty_line() {
        let mock = Builder::new().read(b"\nnext\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await, LineReadOutcome::Line(String::new()));
        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::Line("next".to_string())
        );
    }

    #[tokio::test]
    async fn test_partial_line_at_end_of_stream() {
        let mock = Builder::new().read(b"no newline").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::EndOfStream("no newline".to_string())
        );
    }

    #[tokio::test]
    async fn test_read_error_is_end_of_stream() {
        let mock = Builder::new()
            .read(b"part")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::EndOfStream("part".to_string())
        );
    }

    #[tokio::test]
    async fn test_longest_line_fits() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH - 1];
        input.push(b'\n');
        let mock = Builder::new().read(&input).build();
        let mut reader = LineReader::new(mock);

        match reader.read_line().await {
            LineReadOutcome::Line(text) => assert_eq!(text.len(), MAX_LINE_LENGTH - 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_overlong_line_is_truncated() {
        // 255 bytes then newline: the bound is hit first, so the newline
        // shows up as a separate empty line.
        let mut input = vec![b'x'; MAX_LINE_LENGTH];
        input.extend_from_slice(b"\nafter\n");
        let mock = Builder::new().read(&input).build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await, LineReadOutcome::Truncated);
        assert_eq!(reader.read_line().await, LineReadOutcome::Line(String::new()));
        assert_eq!(
            reader.read_line().await,
            LineReadOutcome::Line("after".to_string())
        );
    }

    #[tokio::test]
    async fn test_read_to_end_after_lines() {
        let mock = Builder::new().read(b"-n\nali").read(b"ce").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await, LineReadOutcome::Line("-n".to_string()));
        assert_eq!(&reader.read_to_end(MAX_LINE_LENGTH).await[..], b"alice");
    }

    #[tokio::test]
    async fn test_read_to_end_is_bounded() {
        let input = vec![b'p'; 300];
        let mock = Builder::new().read(&input).build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_to_end(MAX_LINE_LENGTH).await.len(), MAX_LINE_LENGTH);
    }

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        let mut mock = Builder::new().write(b"hello\n").build();
        send_line(&mut mock, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_raw_has_no_newline() {
        let mut mock = Builder::new().write(b"alice").build();
        send_raw(&mut mock, "alice").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_line_write_failure() {
        let mut mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            .build();
        assert!(send_line(&mut mock, "hello").await.is_err());
    }
}
