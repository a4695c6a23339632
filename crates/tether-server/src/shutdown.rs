//! Shutdown of the listener and every live socket loop.
//!
//! Cancelling the token makes each [`run_socket`](crate::socket::run_socket)
//! leave its read loop with reason `"server shutdown"`, close its session and
//! unregister from the endpoint. Socket loops are tracked so shutdown can
//! wait for that cleanup to finish; anything still queued for an endpoint
//! stays queued.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How long to wait for sockets to unregister before giving up on them.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Stops the server and drains its socket loops.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sockets: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no sockets and nothing cancelled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sockets: TaskTracker::new(),
        }
    }

    /// Token watched by the listener and every socket loop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Count `socket` as live until it completes or is dropped.
    pub fn track_socket<F>(&self, socket: F) -> TrackedFuture<F>
    where
        F: Future<Output = ()>,
    {
        self.sockets.track_future(socket)
    }

    /// Socket loops that have not finished yet.
    pub fn active_sockets(&self) -> usize {
        self.sockets.len()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for every tracked socket to
    /// unregister and for `handles` (the serve task) to finish.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        let _ = self.sockets.close();
        info!(
            sockets = self.sockets.len(),
            tasks = handles.len(),
            timeout_secs = timeout.as_secs(),
            "draining sockets"
        );

        let drain = async {
            let _ = futures::future::join_all(handles).await;
            self.sockets.wait().await;
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                remaining = self.sockets.len(),
                "shutdown timed out after {timeout:?} with sockets still open"
            );
            return false;
        }
        info!("all sockets closed");
        true
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on Ctrl-C (or SIGTERM on unix).
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
