//! `HuddleServer`: Axum HTTP + WebSocket relay server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use huddle_accounts::AccountService;
use huddle_core::Authenticator;

use crate::config::ServerConfig;
use crate::routes;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastEngine;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::SessionContext;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connection set.
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out engine.
    pub engine: Arc<BroadcastEngine>,
    /// Account API backend.
    pub accounts: Arc<AccountService>,
    /// Resolves session tokens for the gateway.
    pub authenticator: Arc<dyn Authenticator>,
    /// Server-wide shutdown signal.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Runtime configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// The slice of state a WebSocket session needs.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: Arc::clone(&self.registry),
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.token(),
        }
    }
}

/// The chat relay server.
pub struct HuddleServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    engine: Arc<BroadcastEngine>,
    accounts: Arc<AccountService>,
    authenticator: Arc<dyn Authenticator>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HuddleServer {
    /// Create a server. `accounts` also authenticates upgrades unless
    /// replaced with [`with_authenticator`](Self::with_authenticator).
    pub fn new(config: ServerConfig, accounts: Arc<AccountService>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            config: Arc::new(config),
            engine: Arc::new(BroadcastEngine::new(Arc::clone(&registry))),
            registry,
            authenticator: Arc::clone(&accounts) as Arc<dyn Authenticator>,
            accounts,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Use a different token authenticator for `/ws` and `/api/me`.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        routes::router(AppState {
            registry: Arc::clone(&self.registry),
            engine: Arc::clone(&self.engine),
            accounts: Arc::clone(&self.accounts),
            authenticator: Arc::clone(&self.authenticator),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        })
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server error");
            }
        });

        info!(%addr, "huddle relay listening");
        Ok((addr, handle))
    }

    /// Live connection set.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Fan-out engine.
    pub fn engine(&self) -> &Arc<BroadcastEngine> {
        &self.engine
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
