//! Connection handler for individual worker and scraper connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` that:
//! - Reads newline-delimited commands until a blank line or EOF
//! - Forwards `server:`/`request:` payloads to the metrics facade
//! - Answers `metrics` with the full snapshot, then closes
//!
//! The whole exchange shares one absolute deadline, fixed at accept time.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use promstat_core::MetricScope;
use promstat_protocol::Command;

use crate::metrics::MetricsFacade;

/// Maximum accepted line length (1 MB), not counting the newline
pub const MAX_LINE_LENGTH: usize = 1_048_576;

/// How a connection ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Peer closed its side
    Eof,

    /// Peer sent a blank line
    Blank,

    /// Snapshot written
    Scraped,
}

/// Connection handler for a single client.
///
/// Generic over the stream halves so tests can drive it with in-memory
/// duplex pipes; the server uses the halves of a `UnixStream`.
pub struct ConnectionHandler<R, W> {
    /// Buffered reader for incoming lines
    reader: BufReader<R>,

    /// Writer for the snapshot response
    writer: W,

    /// Shared registry facade
    facade: Arc<MetricsFacade>,

    /// Absolute deadline for the whole exchange
    deadline: Instant,

    /// Sequence number for log correlation
    connection_number: u64,
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the stream
    /// * `writer` - Write half of the stream
    /// * `facade` - Metrics facade receiving updates
    /// * `deadline` - Instant after which the connection is dropped
    /// * `connection_number` - Unique number for this connection
    pub fn new(
        reader: R,
        writer: W,
        facade: Arc<MetricsFacade>,
        deadline: Instant,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            facade,
            deadline,
            connection_number,
        }
    }

    /// Runs the handler until the connection ends.
    ///
    /// Errors are logged here; the caller only needs to drop the stream.
    pub async fn run(mut self) -> Result<Disconnect, ConnectionError> {
        trace!(connection = self.connection_number, "Client connected");

        let result = self.process_lines().await;
        match &result {
            Ok(reason) => {
                trace!(
                    connection = self.connection_number,
                    reason = ?reason,
                    "Client disconnected"
                );
            }
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Connection closed with error"
                );
            }
        }

        // Best effort: the peer may already be gone
        let _ = self.writer.shutdown().await;
        result
    }

    async fn process_lines(&mut self) -> Result<Disconnect, ConnectionError> {
        let mut line = String::new();
        loop {
            line.clear();
            if !self.read_line(&mut line).await? {
                return Ok(Disconnect::Eof);
            }

            match Command::parse(&line) {
                Command::Close => return Ok(Disconnect::Blank),
                Command::Metrics => {
                    self.write_snapshot().await?;
                    return Ok(Disconnect::Scraped);
                }
                Command::ServerUpdate(payload) => {
                    self.facade.update(MetricScope::Server, payload);
                }
                Command::RequestUpdate(payload) => {
                    self.facade.update(MetricScope::Request, payload);
                }
                Command::Unknown(other) => {
                    trace!(
                        connection = self.connection_number,
                        command = other,
                        "Ignoring unknown command"
                    );
                }
            }
        }
    }

    /// Reads one newline-terminated line into `line`.
    ///
    /// Returns false at end of input. Text left without a newline when the
    /// peer closes is discarded.
    async fn read_line(&mut self, line: &mut String) -> Result<bool, ConnectionError> {
        let limit = (MAX_LINE_LENGTH + 1) as u64;
        let mut limited = (&mut self.reader).take(limit);

        let bytes_read = timeout_at(self.deadline, limited.read_line(line))
            .await
            .map_err(|_| ConnectionError::Timeout)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if line.ends_with('\n') {
            return Ok(true);
        }
        if bytes_read > MAX_LINE_LENGTH {
            return Err(ConnectionError::LineTooLong {
                max: MAX_LINE_LENGTH,
            });
        }
        if bytes_read > 0 {
            trace!(
                connection = self.connection_number,
                bytes = bytes_read,
                "Dropping unterminated line at end of input"
            );
        }
        Ok(false)
    }

    async fn write_snapshot(&mut self) -> Result<(), ConnectionError> {
        let snapshot = self.facade.snapshot();
        debug!(
            connection = self.connection_number,
            bytes = snapshot.len(),
            "Serving metrics snapshot"
        );

        let write = async {
            self.writer.write_all(&snapshot).await?;
            self.writer.flush().await?;
            Ok::<(), std::io::Error>(())
        };

        match timeout_at(self.deadline, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Line too long (max: {max} bytes)")]
    LineTooLong { max: usize },
}
