//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded, tagged by `type` and use snake_case for
//! field names.

use serde::{Deserialize, Serialize};
use syndex_engine::{MarkEvent, Syndex};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sync one type for the connection's subscriber.
    Sync {
        type_name: String,
        /// Replay from this syndex instead of the stored checkpoint
        #[serde(default)]
        reset_syndex: Option<Syndex>,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Pushed to every connection after a ledger write.
    Marked {
        type_name: String,
        /// Counter after the write
        syndex: Syndex,
        /// Number of records the write appended
        count: usize,
    },

    /// Response to a sync request.
    SyncResponse {
        type_name: String,
        ids: Vec<String>,
        syndex: Syndex,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(
        message: impl Into<String>,
        code: Option<&str>,
        request_id: Option<String>,
    ) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: code.map(str::to_string),
            request_id,
        }
    }
}

impl From<&MarkEvent> for ServerMessage {
    fn from(event: &MarkEvent) -> Self {
        ServerMessage::Marked {
            type_name: event.type_name.clone(),
            syndex: event.syndex,
            count: event.records.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syndex_engine::ChangeRecord;

    #[test]
    fn test_client_message_deserialization() {
        let json = r#"{"type": "sync", "type_name": "Order", "reset_syndex": 4, "request_id": "r1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Sync {
                type_name,
                reset_syndex,
                request_id,
            } => {
                assert_eq!(type_name, "Order");
                assert_eq!(reset_syndex, Some(4));
                assert_eq!(request_id.as_deref(), Some("r1"));
            }
            _ => panic!("Expected Sync message"),
        }

        let json = r#"{"type": "sync", "type_name": "Order"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Sync {
                reset_syndex: None,
                request_id: None,
                ..
            }
        ));

        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "push"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "sync"}"#).is_err());
    }

    #[test]
    fn test_server_message_serialization() {
        let msg = ServerMessage::Pong;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let msg = ServerMessage::error("type is required", Some("invalid_argument"), None);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"error","message":"type is required","code":"invalid_argument"}"#
        );

        let msg = ServerMessage::SyncResponse {
            type_name: "Order".into(),
            ids: vec!["o1".into()],
            syndex: 1,
            request_id: Some("r1".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"sync_response","type_name":"Order","ids":["o1"],"syndex":1,"request_id":"r1"}"#
        );
    }

    #[test]
    fn test_marked_from_event() {
        let event = MarkEvent {
            type_name: "User".into(),
            records: vec![ChangeRecord::new("a", 4, None), ChangeRecord::new("b", 5, None)],
            syndex: 5,
        };
        let json = serde_json::to_string(&ServerMessage::from(&event)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"marked","type_name":"User","syndex":5,"count":2}"#
        );
    }
}
