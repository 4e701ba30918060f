//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections per subscriber and fans ledger
//! notifications out to them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Subscriber name the connection syncs as
    pub subscriber: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Connection IDs per subscriber.
    by_subscriber: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection and return its ID.
    pub fn register(&self, subscriber: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                subscriber: subscriber.clone(),
                sender,
            },
        );
        self.by_subscriber
            .entry(subscriber)
            .or_default()
            .push(conn_id.clone());

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(mut conn_ids) = self.by_subscriber.get_mut(&conn.subscriber) {
                conn_ids.retain(|id| id != conn_id);
                if conn_ids.is_empty() {
                    drop(conn_ids);
                    self.by_subscriber
                        .remove_if(&conn.subscriber, |_, ids| ids.is_empty());
                }
            }

            tracing::info!(conn_id = %conn_id, subscriber = %conn.subscriber, "WebSocket connection unregistered");
        }
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            if entry.value().sender.send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::trace!(recipients = sent_count, "Broadcast message to connections");

        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of distinct subscribers with at least one connection.
    pub fn subscriber_count(&self) -> usize {
        self.by_subscriber.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let manager = ConnectionManager::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let conn1 = manager.register("app1".to_string(), tx1);
        let conn2 = manager.register("app1".to_string(), tx2);
        assert_eq!(manager.connection_count(), 2);
        assert_eq!(manager.subscriber_count(), 1);

        manager.unregister(&conn1);
        assert_eq!(manager.subscriber_count(), 1);
        manager.unregister(&conn2);
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.subscriber_count(), 0);

        // Unknown IDs are ignored
        manager.unregister("nope");
    }

    #[test]
    fn test_broadcast_all() {
        let manager = ConnectionManager::new();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, rx3) = mpsc::unbounded_channel();

        manager.register("app1".to_string(), tx1);
        manager.register("app2".to_string(), tx2);
        manager.register("app3".to_string(), tx3);
        // Closed receiver does not count as delivered
        drop(rx3);

        let sent = manager.broadcast_all(ServerMessage::Pong);
        assert_eq!(sent, 2);
        assert!(matches!(rx1.try_recv().unwrap(), ServerMessage::Pong));
        assert!(matches!(rx2.try_recv().unwrap(), ServerMessage::Pong));
    }

    #[test]
    fn test_send_to() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = manager.register("app1".to_string(), tx);

        assert!(manager.send_to(&conn, ServerMessage::Pong));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Pong));
        assert!(!manager.send_to("missing", ServerMessage::Pong));
    }
}
