//! WebSocket session lifecycle: one authenticated client from upgrade
//! through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use huddle_core::{CONNECTED_SENTINEL, Identity, RelayError};

use super::broadcast::BroadcastEngine;
use super::connection::Connection;
use super::gateway::SessionPhase;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Everything a session needs from the server.
#[derive(Clone)]
pub struct SessionContext {
    /// Live connection set.
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out engine.
    pub engine: Arc<BroadcastEngine>,
    /// Queue sizes and timeouts.
    pub config: Arc<ServerConfig>,
    /// Server-wide shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run a session for a client whose upgrade has completed.
///
/// Registers the connection, announces the join to the engine, then relays
/// every inbound text frame until the client leaves, stops answering
/// heartbeats, or the server shuts down. The connection is deregistered
/// exactly once on the way out.
#[instrument(skip_all, fields(username = identity.username(), conn_id = tracing::field::Empty))]
pub async fn run_ws_session(ws: WebSocket, identity: Identity, ctx: SessionContext) {
    let phase = SessionPhase::Upgrading;
    let (conn, mut outbound_rx) = Connection::open(identity, ctx.config.send_queue_capacity);
    let _ = tracing::Span::current().record("conn_id", conn.id().as_str());

    if let Err(e) = ctx.registry.register(Arc::clone(&conn)) {
        debug_assert!(
            !matches!(e, RelayError::DuplicateConnection(_)),
            "fresh connection id collided: {e}"
        );
        error!(error = %e, "rejecting connection");
        let _ = conn.close();
        let _ = phase.advance(SessionPhase::Closed);
        return;
    }

    let phase = phase.advance(SessionPhase::Live);
    info!(user_id = %conn.user_id(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let _ = ctx.engine.handle_inbound(&conn, CONNECTED_SENTINEL);

    let cancel = ctx.shutdown.child_token();
    let (mut sink, mut stream) = ws.split();

    let writer = {
        let cancel = cancel.clone();
        let ping_every = ctx.config.heartbeat_interval();
        let write_timeout = ctx.config.write_timeout();
        tokio::spawn(
            async move {
                let mut ping = time::interval_at(time::Instant::now() + ping_every, ping_every);
                loop {
                    let frame = tokio::select! {
                        () = cancel.cancelled() => break,
                        next = outbound_rx.recv() => match next {
                            Some(text) => Message::Text(text.as_ref().to_owned().into()),
                            None => break,
                        },
                        _ = ping.tick() => Message::Ping(Vec::new().into()),
                    };
                    match time::timeout(write_timeout, sink.send(frame)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            debug!(error = %e, "socket write failed");
                            break;
                        }
                        Err(_) => {
                            warn!(timeout = ?write_timeout, "socket write timed out");
                            break;
                        }
                    }
                }
                cancel.cancel();
                let _ = time::timeout(write_timeout, sink.close()).await;
            }
            .in_current_span(),
        )
    };

    let heartbeat = {
        let conn = Arc::clone(&conn);
        let cancel = cancel.clone();
        let interval = ctx.config.heartbeat_interval();
        let timeout = ctx.config.heartbeat_timeout();
        tokio::spawn(
            async move {
                if run_heartbeat(conn, interval, timeout, cancel.clone()).await
                    == HeartbeatResult::TimedOut
                {
                    warn!(timeout = ?timeout, "client unresponsive, disconnecting");
                    cancel.cancel();
                }
            }
            .in_current_span(),
        )
    };

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "socket read failed");
                break;
            }
            None => break,
        };

        conn.mark_alive();
        match msg {
            Message::Text(text) => {
                let _ = ctx.engine.handle_inbound(&conn, text.as_str());
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = ctx.engine.handle_inbound(&conn, text);
                }
                Err(_) => debug!(len = data.len(), "ignoring non-UTF-8 binary frame"),
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    cancel.cancel();
    let _ = phase.advance(SessionPhase::Closed);
    if conn.close() {
        let _ = ctx.registry.deregister(conn.id());
    }
    let _ = writer.await;
    let _ = heartbeat.await;

    let duration = conn.age();
    info!(
        duration_secs = duration.as_secs_f64(),
        dropped = conn.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(duration.as_secs_f64());
}
