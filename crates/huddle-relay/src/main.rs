//! # huddle-relay
//!
//! Chat relay binary: opens the account database, installs logging and
//! metrics, and serves HTTP + WebSocket until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_accounts::{AccountService, Database};
use huddle_core::logging;
use huddle_server::config::ServerConfig;
use huddle_server::metrics;
use huddle_server::server::HuddleServer;

/// How long shutdown waits for sessions to close.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Huddle chat relay server.
#[derive(Parser, Debug)]
#[command(name = "huddle-relay", about = "Authenticated WebSocket chat relay")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "5000")]
    port: u16,
}

/// `HUDDLE_DB_PATH`, else `~/.huddle/database/users.db`.
fn db_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = lookup("HUDDLE_DB_PATH").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home)
        .join(".huddle")
        .join("database")
        .join("users.db")
}

fn init_logging() {
    let level = std::env::var("HUDDLE_LOG").unwrap_or_else(|_| "info".to_string());
    if std::env::var("HUDDLE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        logging::init_json_subscriber(&level);
    } else {
        logging::init_subscriber(&level);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging();

    let db_path = db_path(|key| std::env::var(key).ok());
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let accounts = Arc::new(AccountService::new(db));

    let mut config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };
    config.apply_env_overrides();

    let handle = metrics::install_recorder().context("Failed to install metrics recorder")?;
    let server = HuddleServer::new(config, accounts).with_metrics(handle);

    let (addr, serve) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Huddle relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = server
        .shutdown()
        .wait_for_sessions(server.registry(), DRAIN_TIMEOUT)
        .await;
    let _ = serve.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
