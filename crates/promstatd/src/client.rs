//! Client side of the metrics socket.
//!
//! Used by workers to push updates and by scrapers to fetch a snapshot.
//! Each call opens its own connection, matching the server's
//! one-exchange-per-connection model.
//!
//! **Panic-Free Policy:** no `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use promstat_protocol::Command;

/// Default client-side timeout for one exchange
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by `MetricsClient`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command {0:?} is not an update")]
    NotAnUpdate(String),
}

/// Connection factory for the metrics socket.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl MetricsClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends update commands on one connection, then closes it with a
    /// blank line.
    ///
    /// Only `ServerUpdate` and `RequestUpdate` are accepted, so the batch
    /// can never end the connection early.
    pub async fn push(&self, updates: &[Command<'_>]) -> Result<(), ClientError> {
        let mut batch = String::new();
        for update in updates {
            if update.as_update().is_none() {
                return Err(ClientError::NotAnUpdate(update.to_string()));
            }
            batch.push_str(&update.to_line());
        }
        batch.push_str(&Command::Close.to_line());

        self.with_deadline(async {
            let mut stream = self.connect().await?;
            stream.write_all(batch.as_bytes()).await?;
            stream.flush().await?;
            // Wait for the server to close its side
            let mut sink = Vec::new();
            stream.read_to_end(&mut sink).await?;
            Ok(())
        })
        .await?;

        debug!(count = updates.len(), "Pushed metric updates");
        Ok(())
    }

    /// Requests the full snapshot.
    pub async fn scrape(&self) -> Result<Vec<u8>, ClientError> {
        self.with_deadline(async {
            let mut stream = self.connect().await?;
            stream
                .write_all(Command::Metrics.to_line().as_bytes())
                .await?;
            stream.flush().await?;

            let mut snapshot = Vec::new();
            stream.read_to_end(&mut snapshot).await?;
            Ok(snapshot)
        })
        .await
    }

    async fn connect(&self) -> Result<UnixStream, ClientError> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: self.socket_path.clone(),
                source,
            })
    }

    async fn with_deadline<T>(
        &self,
        exchange: impl std::future::Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }
}
