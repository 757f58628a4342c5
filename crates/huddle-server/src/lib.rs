//! # huddle-server
//!
//! Axum HTTP + WebSocket server for the Huddle chat relay.
//!
//! - **Registry**: thread-safe set of live connections with snapshot reads
//! - **Broadcast**: best-effort fan-out of every chat line to the whole room
//! - **Gateway**: authenticated `/ws` upgrade and the per-client session loop
//! - **Accounts API**: register/login/logout/me over the account service
//! - **Health / metrics**: `/health` JSON and Prometheus `/metrics`
//! - **Shutdown**: `CancellationToken` shared by the listener and sessions

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, HuddleServer};
pub use websocket::broadcast::{BroadcastEngine, BroadcastOutcome};
pub use websocket::connection::Connection;
pub use websocket::registry::ConnectionRegistry;
