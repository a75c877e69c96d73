//! Database row types: these map directly to SQLite rows.
//! Distinct from aligna-types wire models to keep the DB layer independent.

use aligna_types::models::{ConversationRecord, DeliveryStatus, MessageRecord, RawMessage};
use chrono::{DateTime, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub member_a: String,
    pub member_b: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub client_id: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl ConversationRow {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_a == user_id || self.member_b == user_id
    }

    pub fn to_record(&self) -> ConversationRecord {
        ConversationRecord {
            id: self.id.clone(),
            members: vec![self.member_a.clone(), self.member_b.clone()],
            created_at: parse_timestamp(&self.created_at, &self.id),
        }
    }
}

impl MessageRow {
    pub fn to_raw(&self) -> RawMessage {
        RawMessage {
            id: self.id.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            message: self.body.clone(),
            created_at: parse_timestamp(&self.created_at, &self.id),
            status: Some(DeliveryStatus::parse(&self.status)),
            client_id: self.client_id.clone(),
        }
    }

    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender: self.sender_id.clone(),
            text: self.body.clone(),
            created_at: parse_timestamp(&self.created_at, &self.id),
        }
    }
}

fn parse_timestamp(value: &str, row_id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", value, row_id, e);
            DateTime::default()
        })
}
