//! Live connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use huddle_core::errors::DeliveryFailureReason;
use huddle_core::{ConnectionId, Identity, RelayError, UserId};

/// One authenticated participant's live channel.
///
/// Writes never touch the socket directly: [`Connection::send`] enqueues
/// onto a bounded queue drained by the session's writer task.
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    tx: mpsc::Sender<Arc<str>>,
    /// Cleared exactly once when the session reaches `Closed`.
    live: AtomicBool,
    /// When this connection was established.
    connected_at: Instant,
    /// Whether the client has answered since the last heartbeat check.
    pub(crate) is_alive: AtomicBool,
    dropped_messages: AtomicU64,
}

impl Connection {
    /// Create a connection with a fresh ID and an outbound queue of
    /// `capacity` messages. Returns the receiving end for the writer task.
    pub fn open(identity: Identity, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(ConnectionId::new(), identity, tx)), rx)
    }

    /// Create a connection around an existing sender.
    pub fn new(id: ConnectionId, identity: Identity, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id,
            identity,
            tx,
            live: AtomicBool::new(true),
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Unique connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Display name, fixed at registration.
    pub fn username(&self) -> &str {
        self.identity.username()
    }

    /// Account behind this connection.
    pub fn user_id(&self) -> UserId {
        self.identity.id()
    }

    /// Whether the connection has not been closed yet.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Enqueue a text payload for the client.
    ///
    /// Fails fast with `ConnectionClosed` once closed, and with
    /// `DeliveryFailure` when the queue is full or the writer is gone.
    pub fn send(&self, payload: Arc<str>) -> Result<(), RelayError> {
        if !self.is_live() {
            return Err(RelayError::ConnectionClosed(self.id.clone()));
        }

        let reason = match self.tx.try_send(payload) {
            Ok(()) => return Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => DeliveryFailureReason::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => DeliveryFailureReason::WriterGone,
        };
        let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        Err(RelayError::DeliveryFailure {
            connection: self.id.clone(),
            reason,
        })
    }

    /// Move to the terminal state.
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// callers can tie one-time cleanup (deregistration) to it.
    pub fn close(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or any frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the connection was opened.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username())
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}
