//! Newline-delimited JSON I/O primitives.
//!
//! Used both for the broker's own command channel (stdin/stdout) and for the
//! pipes to a capability helper process.

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Reads non-blank lines from an async byte source.
///
/// Blank lines are skipped. Bytes that are not valid UTF-8 are replaced
/// rather than rejected, so a garbled line still reaches the JSON parser and
/// is reported like any other malformed message.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a new reader.
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Read the next non-blank line, without its terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buffer.clear();

            let bytes_read = self
                .reader
                .read_until(b'\n', &mut self.buffer)
                .await
                .map_err(Error::io)?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&self.buffer);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Ok(Some(line.to_string()));
        }
    }
}

/// Writes one JSON object per line, flushing after every message.
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Create a new writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `message` to a single line.
    pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Write an already encoded line and flush it.
    pub async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line).await.map_err(Error::io)?;
        self.writer.flush().await.map_err(Error::io)?;
        Ok(())
    }

    /// Serialize `message`, write it as one line, and flush.
    pub async fn write_json<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let line = Self::encode(message)?;
        self.write_line(&line).await
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
