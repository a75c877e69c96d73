use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DeliveryStatus, RawMessage};

/// Events sent FROM server TO client over the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Connection accepted for this user
    Ready { user_id: String },

    /// A chat message was created
    NewMessage(RawMessage),

    /// A user started typing
    UserTyping { user_id: String },

    /// A user stopped typing
    UserStopTyping { user_id: String },

    /// Delivery status of a message changed
    MessageStatus {
        message_id: String,
        status: DeliveryStatus,
    },

    /// Full history for the requested conversation, oldest first
    LoadMessages(Vec<RawMessage>),

    /// A command could not be processed
    Error { message: String },
}

/// Commands sent FROM client TO server over the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    /// Post a chat message
    SendMessage {
        message: String,
        sender_id: String,
        receiver_id: String,
        created_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Indicate typing towards a user
    Typing { receiver_id: String },

    /// Typing went idle
    StopTyping { receiver_id: String },

    /// Request the history of the conversation with `receiver_id`
    GetMessages { receiver_id: String },

    /// Acknowledge a received message as read
    MarkRead { message_id: String },
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "sendMessage",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stopTyping",
            Self::GetMessages { .. } => "getMessages",
            Self::MarkRead { .. } => "markRead",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_wire_shape() {
        let created_at = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let cmd = ClientCommand::SendMessage {
            message: "hello".into(),
            sender_id: "u1".into(),
            receiver_id: "agent".into(),
            created_at,
            client_id: Some("c-1".into()),
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["event"], "sendMessage");
        assert_eq!(value["data"]["senderId"], "u1");
        assert_eq!(value["data"]["receiverId"], "agent");
        assert_eq!(value["data"]["clientId"], "c-1");
        assert_eq!(cmd.name(), "sendMessage");
    }

    #[test]
    fn client_id_is_omitted_when_absent() {
        let cmd = ClientCommand::SendMessage {
            message: "hi".into(),
            sender_id: "u1".into(),
            receiver_id: "agent".into(),
            created_at: Utc::now(),
            client_id: None,
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert!(value["data"].get("clientId").is_none());
    }

    #[test]
    fn parses_inbound_events() {
        let typing: ServerEvent =
            serde_json::from_value(json!({"event": "userTyping", "data": {"userId": "agent"}}))
                .unwrap();
        assert_eq!(typing, ServerEvent::UserTyping { user_id: "agent".into() });

        let status: ServerEvent = serde_json::from_value(json!({
            "event": "messageStatus",
            "data": {"messageId": "m42", "status": "read"}
        }))
        .unwrap();
        assert_eq!(
            status,
            ServerEvent::MessageStatus {
                message_id: "m42".into(),
                status: DeliveryStatus::Read,
            }
        );

        let history: ServerEvent = serde_json::from_value(json!({
            "event": "loadMessages",
            "data": [{
                "_id": "m1",
                "senderId": "agent",
                "receiverId": "u1",
                "message": "Welcome",
                "createdAt": "2024-05-01T10:00:00Z",
                "status": null
            }]
        }))
        .unwrap();
        match history {
            ServerEvent::LoadMessages(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].message, "Welcome");
                assert_eq!(list[0].status, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
