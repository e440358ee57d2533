//! Line-delimited transport for MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! The transport is generic over any buffered reader and writer so that
//! sessions can be driven from memory in tests; [`StdioTransport`] is the
//! production instance.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::protocol::{JsonRpcError, OutgoingMessage};

/// A newline-delimited JSON-RPC transport.
pub struct LineTransport<R, W> {
    /// Buffered input stream.
    reader: R,
    /// Output stream.
    writer: W,
}

/// The stdin/stdout transport.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::stdio()
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over the given streams.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message line as raw bytes.
    ///
    /// The trailing `\n` (and a preceding `\r`) is removed. Returns `None`
    /// at end of stream. A final line without a newline is still returned.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the input stream fails.
    pub async fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            // EOF - input closed
            return Ok(None);
        }

        // Remove the trailing newline
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes one envelope as a single line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails. Serialisation failures never
    /// surface here: see [`encode_message`].
    pub async fn write_message(&mut self, message: &OutgoingMessage) -> io::Result<()> {
        match encode_message(message) {
            Some(json) => self.write_raw(&json).await,
            None => Ok(()),
        }
    }

    /// Writes a raw JSON string with newline termination.
    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        // MCP stdio framing: no embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Consumes the transport, returning the underlying streams.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Serialises an envelope to one line of JSON.
///
/// If the envelope cannot be serialised, an internal error carrying the same
/// ID is produced instead so the client still gets a reply. Returns `None`
/// only if even that fallback fails; the failure is logged.
#[must_use]
pub fn encode_message(message: &OutgoingMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(error = %e, id = ?message.id(), "Failed to serialise response");
            let fallback = OutgoingMessage::from(
                JsonRpcError::internal_error(
                    message.id().cloned(),
                    "Internal error: failed to serialise response",
                )
                .with_cause(&e),
            );
            serde_json::to_string(&fallback)
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to serialise fallback error; dropping reply");
                })
                .ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcResponse, RequestId};

    #[tokio::test]
    async fn reads_lines_and_strips_terminators() {
        let input: &[u8] = b"first\r\nsecond\n\nlast";
        let mut transport = LineTransport::new(input, Vec::new());

        assert_eq!(transport.read_line().await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(transport.read_line().await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(transport.read_line().await.unwrap(), Some(Vec::new()));
        assert_eq!(transport.read_line().await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_error_propagates() {
        let mock = tokio_test::io::Builder::new()
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let mut transport = LineTransport::new(BufReader::new(mock), Vec::new());

        let err = transport.read_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn writes_one_line_per_message() {
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        let response = JsonRpcResponse::success(
            RequestId::from(1),
            serde_json::json!({
                "message": "hello\nworld",
                "nested": {"key": "value"}
            }),
        );
        transport.write_message(&response.into()).await.unwrap();
        transport
            .write_message(&JsonRpcError::parse_error().into())
            .await
            .unwrap();

        let (_, out) = transport.into_inner();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""id":1"#));
        assert!(lines[1].contains(r#""id":null"#));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn encode_message_never_contains_newlines() {
        let error = JsonRpcError::method_not_found(Some(RequestId::from(1)), "test/method");
        let json = encode_message(&error.into()).unwrap();
        assert!(!json.contains('\n'), "Serialised JSON should not contain newlines");
    }

    #[test]
    fn transport_default() {
        // Just ensure Default is implemented and doesn't panic
        let _transport = StdioTransport::default();
    }
}
