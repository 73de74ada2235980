use tokio_util::sync::CancellationToken;
use tracing::info;

/// Time allowed for in-flight HTTP requests to drain before the process
/// exits anyway.
pub const HTTP_DRAIN_TIMEOUT_SECS: u64 = 10;

/// Graceful shutdown coordinator.
///
/// Broadcasts shutdown to the HTTP server (and any helper tasks) through a
/// single `CancellationToken`.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A clone of the cancellation token for tasks to listen on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Block until SIGINT or SIGTERM arrives, then broadcast shutdown.
    pub async fn wait_for_signal_and_shutdown(&self) {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C)");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
        }

        info!("shutdown signal received, broadcasting to all tasks");
        self.token.cancel();
    }
}
