//! WebSocket client protocol for the `/ws` realtime transport. No
//! authentication in scope; a connection subscribes to exactly one room at
//! a time.

use chatstorm_domain::ChatMessage;
use serde::{Deserialize, Serialize};

/// Client -> gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { room_id: String },
}

/// Gateway -> client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "subscribed")]
    Subscribed { room_id: String },
    #[serde(rename = "chat")]
    Chat {
        #[serde(flatten)]
        message: Box<ChatMessage>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_deserializes_from_wire_shape() {
        let raw = r#"{"type":"subscribe","room_id":"room:demo"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Subscribe { room_id } => assert_eq!(room_id, "room:demo"),
        }
    }

    #[test]
    fn subscribed_serializes_to_wire_shape() {
        let msg = ServerMessage::Subscribed { room_id: "room:demo".into() };
        let raw = serde_json::to_value(&msg).unwrap();
        assert_eq!(raw["type"], "subscribed");
        assert_eq!(raw["room_id"], "room:demo");
    }
}
