//! Initialization entry point.
//!
//! `StatusServer` is the single owner of the process-wide collector state:
//! the metrics facade, the resolved socket path, and the active listener.
//! Every (re-)initialization from the host goes through
//! [`StatusServer::initialize`], which runs these steps in order and stops
//! at the first failure:
//!
//! 1. apply logging verbosity
//! 2. register the metrics schema
//! 3. resolve the socket path (once per process unless cleared)
//! 4. close the previous listener, waiting for its fd to be released
//! 5. start a new socket server and wait for its start signal
//! 6. hand the socket path back
//!
//! `&mut self` on every transition keeps starts strictly sequential.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use promstat_core::StatusConfig;

use crate::logging::init_logging;
use crate::metrics::{MetricsError, MetricsFacade};
use crate::server::{spawn_server, ActiveListener, ServerError, SocketOwner, SocketServer};

/// Prefix and suffix of generated socket file names
const SOCKET_PREFIX: &str = "metrics.";
const SOCKET_SUFFIX: &str = ".sock";

/// Errors from one initialization attempt.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to initialize metrics: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Failed to create socket path in {dir}: {error}")]
    SocketPath { dir: PathBuf, error: String },

    #[error("Metrics socket did not start: {0}")]
    Server(#[from] ServerError),

    #[error("Metrics server task exited before reporting")]
    StartAborted,
}

/// Process-wide metrics collector state.
///
/// Each failed step of [`initialize`](Self::initialize) logs its cause once
/// at `error`; callers only see the returned `InitError`.
pub struct StatusServer {
    facade: Arc<MetricsFacade>,
    socket_path: Option<PathBuf>,
    listener: Option<ActiveListener>,
}

impl Default for StatusServer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusServer {
    pub fn new() -> Self {
        Self {
            facade: Arc::new(MetricsFacade::new()),
            socket_path: None,
            listener: None,
        }
    }

    /// Facade shared with the connection handlers.
    pub fn facade(&self) -> Arc<MetricsFacade> {
        Arc::clone(&self.facade)
    }

    /// Socket path resolved by an earlier initialization, if any.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }

    /// True while a listener started by this server is accepting.
    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(ActiveListener::is_running)
    }

    /// Forgets the resolved socket path; the next initialization creates a
    /// new one.
    pub fn clear_socket_path(&mut self) {
        self.socket_path = None;
    }

    /// Runs the full initialization sequence and returns the socket path
    /// workers should connect to.
    pub async fn initialize(&mut self, config: &StatusConfig) -> Result<PathBuf, InitError> {
        init_logging(config.debug);

        self.facade.register(config).map_err(|e| {
            error!(error = %e, "Failed to initialize metrics");
            InitError::from(e)
        })?;

        let socket_path = self.resolve_socket_path(config)?;

        if let Some(previous) = self.listener.take() {
            debug!(socket = %previous.socket_path().display(), "Closing previous listener");
            previous.close().await;
        }

        let owner = resolve_owner(config);
        let server = SocketServer::new(
            socket_path.clone(),
            owner,
            config.socket_timeout(),
            self.facade(),
            CancellationToken::new(),
        );

        let (listener, started) = spawn_server(server);
        match started.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                // Already logged by the server task
                listener.close().await;
                return Err(e.into());
            }
            Err(_) => {
                error!(socket = %socket_path.display(), "Metrics server task exited before reporting");
                listener.close().await;
                return Err(InitError::StartAborted);
            }
        }
        self.listener = Some(listener);

        info!(
            version = %config.version,
            socket = %socket_path.display(),
            uid = owner.uid,
            gid = owner.gid,
            build = env!("CARGO_PKG_VERSION"),
            "Metrics collector initialized"
        );
        Ok(socket_path)
    }

    /// Host-boundary form of [`initialize`](Self::initialize): the socket
    /// path as text, or an empty string when metrics are unavailable.
    ///
    /// The failing step has already logged the cause.
    pub async fn initialize_for_host(&mut self, config: &StatusConfig) -> String {
        match self.initialize(config).await {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                debug!(error = %e, "Metrics collector unavailable");
                String::new()
            }
        }
    }

    /// Closes the active listener, leaving the socket file in place.
    pub async fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.close().await;
            info!("Metrics collector stopped");
        }
    }

    fn resolve_socket_path(&mut self, config: &StatusConfig) -> Result<PathBuf, InitError> {
        if let Some(path) = &self.socket_path {
            return Ok(path.clone());
        }

        let dir = config.socket_dir();
        let path = create_socket_path(&dir).map_err(|e| {
            error!(dir = %dir.display(), error = %e, "Failed to create socket path");
            InitError::SocketPath {
                dir: dir.clone(),
                error: e.to_string(),
            }
        })?;

        debug!(socket = %path.display(), "Resolved socket path");
        self.socket_path = Some(path.clone());
        Ok(path)
    }
}

/// Reserves a unique `metrics.*.sock` name in `dir`.
///
/// The placeholder file is kept; the server removes it right before bind.
fn create_socket_path(dir: &Path) -> std::io::Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix(SOCKET_PREFIX)
        .suffix(SOCKET_SUFFIX)
        .tempfile_in(dir)?;
    let (_file, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

/// Configured identity, defaulting to the effective uid/gid of this process.
fn resolve_owner(config: &StatusConfig) -> SocketOwner {
    // SAFETY: geteuid/getegid cannot fail and touch no memory
    let (euid, egid) = unsafe { (libc::geteuid(), libc::getegid()) };
    SocketOwner {
        uid: config.uid.unwrap_or(euid),
        gid: config.gid.unwrap_or(egid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Collects formatted log output for the current thread.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn error_lines(&self) -> usize {
            let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            text.lines().filter(|line| line.contains("ERROR")).count()
        }
    }

    fn config(dir: &Path) -> StatusConfig {
        StatusConfig {
            tmp_folder: Some(dir.to_path_buf()),
            label_names: "method;status".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_socket_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = create_socket_path(temp_dir.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("metrics."));
        assert!(name.ends_with(".sock"));
        assert_eq!(path.parent(), Some(temp_dir.path()));

        let other = create_socket_path(temp_dir.path()).unwrap();
        assert_ne!(path, other);
    }

    #[test]
    fn test_resolve_owner_defaults_to_self() {
        let owner = resolve_owner(&StatusConfig::default());
        // SAFETY: see resolve_owner
        let euid = unsafe { libc::geteuid() };
        assert_eq!(owner.uid, euid);

        let owner = resolve_owner(&StatusConfig {
            uid: Some(33),
            gid: Some(34),
            ..Default::default()
        });
        assert_eq!(owner, SocketOwner { uid: 33, gid: 34 });
    }

    #[tokio::test]
    async fn test_registration_failure_aborts_before_socket() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut server = StatusServer::new();
        let config = StatusConfig {
            label_names: "bad-label".to_string(),
            ..config(temp_dir.path())
        };

        assert!(matches!(
            server.initialize(&config).await,
            Err(InitError::Metrics(_))
        ));
        assert!(server.socket_path().is_none());
        assert!(!server.is_listening());
        assert_eq!(server.initialize_for_host(&config).await, "");
    }

    #[tokio::test]
    async fn test_registration_failure_logged_once() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let temp_dir = tempfile::tempdir().unwrap();
        let mut server = StatusServer::new();
        let config = StatusConfig {
            time_buckets: "1;oops".to_string(),
            ..config(temp_dir.path())
        };

        assert_eq!(server.initialize_for_host(&config).await, "");
        assert_eq!(logs.error_lines(), 1);
    }

    #[tokio::test]
    async fn test_missing_tmp_folder() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut server = StatusServer::new();
        let config = config(&temp_dir.path().join("does-not-exist"));

        assert!(matches!(
            server.initialize(&config).await,
            Err(InitError::SocketPath { .. })
        ));
        assert!(!server.is_listening());
    }

    #[tokio::test]
    async fn test_path_is_stable_until_cleared() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut server = StatusServer::new();
        let config = config(temp_dir.path());

        let first = server.initialize(&config).await.unwrap();
        let second = server.initialize(&config).await.unwrap();
        assert_eq!(first, second);
        assert!(server.is_listening());

        server.clear_socket_path();
        let third = server.initialize(&config).await.unwrap();
        assert_ne!(first, third);

        server.shutdown().await;
        assert!(!server.is_listening());
        assert!(third.exists());
    }
}
