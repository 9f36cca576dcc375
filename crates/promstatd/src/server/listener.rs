//! Ownership of the live listening-handle.

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to a running `SocketServer` task.
///
/// At most one exists per `StatusServer`. Closing it stops the accept
/// loop and waits until the listener fd is released, so a new server can
/// bind the same path right after. Dropping it without `close` still
/// stops the accept loop, but does not wait.
pub struct ActiveListener {
    socket_path: PathBuf,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ActiveListener {
    pub(crate) fn new(
        socket_path: PathBuf,
        cancel_token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            socket_path,
            cancel_token,
            task: Some(task),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns true while the accept loop task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops accepting and waits for the listener to be dropped.
    ///
    /// Connections already accepted keep running until they finish or hit
    /// their deadline.
    pub async fn close(mut self) {
        debug!(socket = %self.socket_path.display(), "Closing metrics listener");
        self.cancel_token.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Metrics server task ended abnormally");
            }
        }
    }
}

impl Drop for ActiveListener {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_cancels_and_joins() {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move { task_token.cancelled().await });

        let listener = ActiveListener::new(PathBuf::from("/tmp/x.sock"), token.clone(), task);
        assert!(listener.is_running());
        assert_eq!(listener.socket_path(), Path::new("/tmp/x.sock"));

        listener.close().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move { task_token.cancelled().await });

        drop(ActiveListener::new(PathBuf::from("/tmp/x.sock"), token.clone(), task));
        assert!(token.is_cancelled());
    }
}
