use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state reported by the server for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse used for values read back from storage.
    pub fn parse(value: &str) -> Self {
        match value {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            _ => Self::Unknown,
        }
    }
}

/// A chat message as it travels over the gateway (`newMessage`, `loadMessages`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
    /// Correlation id of the provisional message this one confirms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// A two-member support conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A message as returned by the REST endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_tolerated() {
        let raw = r#"{"_id":"m1","senderId":"a","receiverId":"b","message":"hi",
            "createdAt":"2024-05-01T10:00:00Z","status":"archived"}"#;
        let msg: RawMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.status, Some(DeliveryStatus::Unknown));
        assert_eq!(msg.client_id, None);
    }

    #[test]
    fn status_parse_matches_as_str() {
        for status in [DeliveryStatus::Sent, DeliveryStatus::Delivered, DeliveryStatus::Read] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), status);
        }
        assert_eq!(DeliveryStatus::parse("bogus"), DeliveryStatus::Unknown);
    }
}
