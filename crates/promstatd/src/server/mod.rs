//! Local socket server for the metrics collector.
//!
//! The server:
//! - Removes any stale file at the socket path and binds a Unix listener
//! - Hands ownership of the socket file to the worker identity
//! - Reports bind success or failure exactly once through a oneshot
//! - Spawns a ConnectionHandler for each accepted client
//! - Stops accepting when its CancellationToken is triggered
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   start signal   ┌──────────────────┐
//! │  SocketServer   │ ───────────────▶ │   StatusServer   │
//! │                 │                  │ (initialization) │
//! │  UnixListener   │ ◀─────────────── │                  │
//! └───────┬─────────┘   cancel token   └──────────────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  MetricsFacade  │
//! │ (per connection)│     │                 │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! The socket file is left in place when the server stops;
//! the next start removes it right before binding.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Per-connection errors never reach the accept loop

mod connection;
mod listener;

pub use connection::{ConnectionError, ConnectionHandler, Disconnect, MAX_LINE_LENGTH};
pub use listener::ActiveListener;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::MetricsFacade;

/// Deadline used when the configured timeout does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Outcome of a start attempt, delivered once to whoever started the server.
pub type StartSignal = oneshot::Sender<Result<(), ServerError>>;

/// Owner applied to the socket file after bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketOwner {
    pub uid: u32,
    pub gid: u32,
}

/// Unix socket server for one listening-handle lifetime.
pub struct SocketServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    /// Identity the socket file is handed to
    owner: SocketOwner,

    /// Deadline granted to every accepted connection
    connection_timeout: Duration,

    /// Facade shared with every connection handler
    facade: Arc<MetricsFacade>,

    /// Triggered to close the listener
    cancel_token: CancellationToken,

    /// Connection counter for log correlation
    connection_counter: AtomicU64,
}

impl SocketServer {
    /// Creates a new socket server.
    ///
    /// # Arguments
    ///
    /// * `socket_path` - Path where the Unix socket will be created
    /// * `owner` - uid/gid applied to the socket file
    /// * `connection_timeout` - Absolute deadline for each connection
    /// * `facade` - Metrics facade receiving updates
    /// * `cancel_token` - Token that closes the listener
    pub fn new(
        socket_path: impl Into<PathBuf>,
        owner: SocketOwner,
        connection_timeout: Duration,
        facade: Arc<MetricsFacade>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            owner,
            connection_timeout,
            facade,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Binds, reports the outcome on `started`, then accepts until cancelled.
    ///
    /// Setup failures are sent on `started` and also returned. Cancellation
    /// is an orderly shutdown and returns `Ok`; any other accept error ends
    /// the loop with an error.
    pub async fn run(self, started: StartSignal) -> Result<(), ServerError> {
        let listener = match self.bind() {
            Ok(listener) => listener,
            Err(e) => {
                error!(socket = %self.socket_path.display(), error = %e, "Metrics socket setup failed");
                let _ = started.send(Err(e.clone()));
                return Err(e);
            }
        };

        debug!(socket = %self.socket_path.display(), "Listening on metrics socket");
        if started.send(Ok(())).is_err() {
            debug!("Start signal receiver dropped");
        }

        let result = self.accept_loop(&listener).await;
        drop(listener);
        debug!(socket = %self.socket_path.display(), "Metrics listener closed");
        result
    }

    /// Removes a stale socket file, binds, and applies ownership.
    ///
    /// The listener is dropped (and its fd released) if ownership cannot be
    /// applied.
    fn bind(&self) -> Result<UnixListener, ServerError> {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => debug!(socket = %self.socket_path.display(), "Removed stale socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                debug!(socket = %self.socket_path.display(), error = %e, "Could not remove stale socket file");
            }
        }

        debug!(
            socket = %self.socket_path.display(),
            uid = self.owner.uid,
            gid = self.owner.gid,
            "Binding metrics socket"
        );

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| ServerError::Bind {
            path: self.socket_path.clone(),
            error: e.to_string(),
        })?;

        std::os::unix::fs::chown(&self.socket_path, Some(self.owner.uid), Some(self.owner.gid))
            .map_err(|e| ServerError::Chown {
                path: self.socket_path.clone(),
                uid: self.owner.uid,
                gid: self.owner.gid,
                error: e.to_string(),
            })?;

        Ok(listener)
    }

    async fn accept_loop(&self, listener: &UnixListener) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!(socket = %self.socket_path.display(), "Listener close requested");
                    return Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            return Err(ServerError::Accept(e.to_string()));
                        }
                    }
                }
            }
        }
    }

    /// Spawns a handler task; the accept loop never waits on it.
    fn handle_connection(&self, stream: UnixStream, connection_number: u64) {
        let deadline = connection_deadline(Instant::now(), self.connection_timeout);
        let (reader, writer) = stream.into_split();
        let facade = Arc::clone(&self.facade);

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(reader, writer, facade, deadline, connection_number);
            // Errors are logged by the handler
            let _ = handler.run().await;
        });
    }
}

/// Absolute deadline for a connection accepted at `accepted`.
fn connection_deadline(accepted: Instant, timeout: Duration) -> Instant {
    accepted
        .checked_add(timeout)
        .or_else(|| accepted.checked_add(FAR_FUTURE))
        .unwrap_or(accepted)
}

/// Starts a server task and returns its start signal receiver.
///
/// Convenience for callers that want the `ActiveListener` handle even
/// before the outcome is known.
pub fn spawn_server(
    server: SocketServer,
) -> (ActiveListener, oneshot::Receiver<Result<(), ServerError>>) {
    let (started_tx, started_rx) = oneshot::channel();
    let socket_path = server.socket_path.clone();
    let cancel_token = server.cancel_token.clone();

    let handle = tokio::spawn(async move {
        // Failures are logged and signalled by `run`
        let _ = server.run(started_tx).await;
    });

    info!(socket = %socket_path.display(), "Metrics server task started");
    (
        ActiveListener::new(socket_path, cancel_token, handle),
        started_rx,
    )
}

/// Errors that can occur in server operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind socket at {path}: {error}")]
    Bind { path: PathBuf, error: String },

    #[error("Failed to chown socket {path} to {uid}:{gid}: {error}")]
    Chown {
        path: PathBuf,
        uid: u32,
        gid: u32,
        error: String,
    },

    #[error("Failed to accept connection: {0}")]
    Accept(String),
}
