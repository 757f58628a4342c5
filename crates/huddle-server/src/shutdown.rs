//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::websocket::registry::ConnectionRegistry;

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Owns the server-wide shutdown signal.
///
/// The HTTP listener and every live session watch the same token, so one
/// [`shutdown`](Self::shutdown) stops accepting and closes all sessions.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until every session has deregistered, or `timeout` passes.
    ///
    /// Returns `true` if the registry drained.
    pub async fn wait_for_sessions(&self, registry: &ConnectionRegistry, timeout: Duration) -> bool {
        info!(remaining = registry.len(), "waiting for sessions to close");
        let drained = tokio::time::timeout(timeout, async {
            while !registry.is_empty() {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(remaining = registry.len(), "shutdown timed out after {timeout:?}");
        }
        drained
    }
}
