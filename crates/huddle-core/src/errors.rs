//! Relay error taxonomy.

use crate::ids::ConnectionId;

/// Why a single recipient write did not go through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryFailureReason {
    /// The recipient's outbound queue is at capacity.
    QueueFull,
    /// The recipient's writer task has gone away.
    WriterGone,
}

impl std::fmt::Display for DeliveryFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueFull => f.write_str("outbound queue full"),
            Self::WriterGone => f.write_str("writer gone"),
        }
    }
}

/// Errors raised by the real-time relay.
///
/// Authentication and upgrade failures surface to the affected client only.
/// Delivery failures never leave the process beyond a log line.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Missing, unknown, or revoked session; the client may log in again.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The request was not a valid WebSocket upgrade.
    #[error("upgrade failed: {0}")]
    UpgradeFailure(String),

    /// A connection ID was registered twice.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// A write to one fan-out recipient failed.
    #[error("delivery to {connection} failed: {reason}")]
    DeliveryFailure {
        /// The recipient.
        connection: ConnectionId,
        /// What went wrong.
        reason: DeliveryFailureReason,
    },

    /// The connection has reached its terminal state.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
}

impl RelayError {
    /// Whether the client may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthenticationFailure(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure(_) => "authentication_failure",
            Self::UpgradeFailure(_) => "upgrade_failure",
            Self::DuplicateConnection(_) => "duplicate_connection",
            Self::DeliveryFailure { .. } => "delivery_failure",
            Self::ConnectionClosed(_) => "connection_closed",
        }
    }
}
