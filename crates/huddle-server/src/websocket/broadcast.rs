//! Chat message fan-out to every live connection.

use std::sync::Arc;

use tracing::{debug, warn};

use huddle_core::CONNECTED_SENTINEL;

use super::connection::Connection;
use super::registry::ConnectionRegistry;
use crate::metrics::{CHAT_MESSAGES_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The join sentinel; nothing was sent.
    Swallowed,
    /// Fan-out ran over a registry snapshot.
    Delivered {
        /// Connections in the snapshot.
        recipients: usize,
        /// Recipients whose enqueue failed.
        failed: usize,
    },
}

impl BroadcastOutcome {
    /// Recipients that actually got the message queued.
    pub fn delivered(&self) -> usize {
        match self {
            Self::Swallowed => 0,
            Self::Delivered { recipients, failed } => recipients - failed,
        }
    }
}

/// Relays inbound text to the whole room.
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastEngine {
    /// Create an engine over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one inbound message from `sender`.
    ///
    /// The payload goes out verbatim to every registered connection,
    /// the sender included. A failed recipient is logged and skipped.
    pub fn handle_inbound(&self, sender: &Connection, text: &str) -> BroadcastOutcome {
        if text == CONNECTED_SENTINEL {
            debug!(conn_id = %sender.id(), username = sender.username(), "user joined");
            return BroadcastOutcome::Swallowed;
        }

        let recipients = self.registry.snapshot();
        let payload: Arc<str> = Arc::from(text);
        let mut failed = 0;

        for conn in &recipients {
            if let Err(e) = conn.send(Arc::clone(&payload)) {
                failed += 1;
                metrics::counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    conn_id = %conn.id(),
                    from = %sender.id(),
                    error_kind = e.error_kind(),
                    error = %e,
                    "dropped message for recipient"
                );
            }
        }

        metrics::counter!(CHAT_MESSAGES_TOTAL).increment(1);
        debug!(
            from = %sender.id(),
            username = sender.username(),
            recipients = recipients.len(),
            failed,
            "broadcast message"
        );
        BroadcastOutcome::Delivered {
            recipients: recipients.len(),
            failed,
        }
    }

    /// The registry this engine reads from.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{Identity, UserId};
    use tokio::sync::mpsc;

    fn join(
        registry: &ConnectionRegistry,
        name: &str,
    ) -> (Arc<Connection>, mpsc::Receiver<Arc<str>>) {
        let (conn, rx) = Connection::open(Identity::new(UserId::new(1), name), 8);
        registry.register(conn.clone()).unwrap();
        (conn, rx)
    }

    fn room(n: usize) -> (BroadcastEngine, Vec<(Arc<Connection>, mpsc::Receiver<Arc<str>>)>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let members = (0..n).map(|i| join(&registry, &format!("user{i}"))).collect();
        (BroadcastEngine::new(registry), members)
    }

    #[test]
    fn message_reaches_everyone_including_sender() {
        let (engine, mut members) = room(3);
        let sender = members[0].0.clone();

        let outcome = engine.handle_inbound(&sender, "hello");
        assert_eq!(outcome, BroadcastOutcome::Delivered { recipients: 3, failed: 0 });

        for (_, rx) in &mut members {
            assert_eq!(&*rx.try_recv().unwrap(), "hello");
        }
    }

    #[test]
    fn payload_is_relayed_verbatim() {
        let (engine, mut members) = room(1);
        let sender = members[0].0.clone();
        let text = "  {\"not\": \"parsed\"} ✓ ";

        let _ = engine.handle_inbound(&sender, text);
        assert_eq!(&*members[0].1.try_recv().unwrap(), text);
    }

    #[test]
    fn sentinel_is_swallowed() {
        let (engine, mut members) = room(3);
        let sender = members[1].0.clone();

        let outcome = engine.handle_inbound(&sender, CONNECTED_SENTINEL);
        assert_eq!(outcome, BroadcastOutcome::Swallowed);
        assert_eq!(outcome.delivered(), 0);
        for (_, rx) in &mut members {
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn near_sentinel_is_broadcast() {
        let (engine, members) = room(2);
        let outcome = engine.handle_inbound(&members[0].0, "User connected! ");
        assert_eq!(outcome.delivered(), 2);
    }

    #[test]
    fn failed_recipient_is_isolated() {
        let (engine, mut members) = room(3);
        let (_, gone_rx) = members.remove(1);
        drop(gone_rx);
        let sender = members[0].0.clone();

        let outcome = engine.handle_inbound(&sender, "still here");
        assert_eq!(outcome, BroadcastOutcome::Delivered { recipients: 3, failed: 1 });
        assert_eq!(outcome.delivered(), 2);
        for (_, rx) in &mut members {
            assert_eq!(&*rx.try_recv().unwrap(), "still here");
        }
    }

    #[test]
    fn full_queue_drops_only_for_that_recipient() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (slow, _slow_rx) = Connection::open(Identity::new(UserId::new(2), "slow"), 1);
        registry.register(slow.clone()).unwrap();
        let (fast, mut fast_rx) = join(&registry, "fast");
        let engine = BroadcastEngine::new(registry);

        let _ = engine.handle_inbound(&fast, "one");
        let outcome = engine.handle_inbound(&fast, "two");

        assert_eq!(outcome, BroadcastOutcome::Delivered { recipients: 2, failed: 1 });
        assert_eq!(slow.drop_count(), 1);
        assert_eq!(&*fast_rx.try_recv().unwrap(), "one");
        assert_eq!(&*fast_rx.try_recv().unwrap(), "two");
    }

    #[test]
    fn deregistered_connection_stops_receiving() {
        let (engine, mut members) = room(3);
        let (left, mut left_rx) = members.remove(2);
        assert!(engine.registry().deregister(left.id()));

        let outcome = engine.handle_inbound(&members[0].0, "after");
        assert_eq!(outcome.delivered(), 2);
        assert!(left_rx.try_recv().is_err());
        for (_, rx) in &mut members {
            assert_eq!(&*rx.try_recv().unwrap(), "after");
        }
    }

    #[test]
    fn empty_room_delivers_nothing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (ghost, _rx) = Connection::open(Identity::new(UserId::new(9), "ghost"), 4);
        let engine = BroadcastEngine::new(registry);

        let outcome = engine.handle_inbound(&ghost, "anyone?");
        assert_eq!(outcome, BroadcastOutcome::Delivered { recipients: 0, failed: 0 });
    }

    #[test]
    fn per_sender_order_is_preserved() {
        let (engine, mut members) = room(2);
        let sender = members[0].0.clone();
        for i in 0..5 {
            let _ = engine.handle_inbound(&sender, &format!("m{i}"));
        }
        let (_, rx) = &mut members[1];
        for i in 0..5 {
            assert_eq!(&*rx.try_recv().unwrap(), format!("m{i}"));
        }
    }
}
