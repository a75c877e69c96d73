use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use aligna_db::Database;
use aligna_db::models::MessageRow;
use aligna_db::queries::NewMessage;
use aligna_types::events::ServerEvent;
use aligna_types::models::DeliveryStatus;

use crate::dispatcher::Dispatcher;

/// Storage and routing shared by the gateway and the REST handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Dispatcher,
    pub db: Arc<Database>,
}

/// A message to store and relay.
pub struct OutboundMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(db: Database) -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            db: Arc::new(db),
        }
    }

    /// Run blocking DB work off the async runtime.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref())).await?
    }

    /// Store a message in the members' conversation and push `newMessage`
    /// to both of them.
    pub async fn post_message(&self, msg: OutboundMessage) -> Result<MessageRow> {
        let status = if msg.sender_id != msg.receiver_id
            && self.dispatcher.is_online(&msg.receiver_id).await
        {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        };

        let row = self
            .with_db(move |db| {
                let conversation = db.find_or_create_conversation(&msg.sender_id, &msg.receiver_id)?;
                db.insert_message(&NewMessage {
                    conversation_id: &conversation.id,
                    sender_id: &msg.sender_id,
                    receiver_id: &msg.receiver_id,
                    body: &msg.body,
                    client_id: msg.client_id.as_deref(),
                    status: status.as_str(),
                    created_at: msg.created_at,
                })
            })
            .await?;

        debug!(
            "Stored message {} ({} -> {}, {})",
            row.id, row.sender_id, row.receiver_id, row.status
        );

        self.dispatcher
            .send_to_members(&row.sender_id, &row.receiver_id, ServerEvent::NewMessage(row.to_raw()))
            .await;

        Ok(row)
    }

    /// Mark a message read on behalf of its receiver and notify both sides.
    pub async fn mark_read(&self, reader_id: &str, message_id: &str) -> Result<MessageRow> {
        let reader = reader_id.to_string();
        let id = message_id.to_string();
        let row = self
            .with_db(move |db| {
                let row = db
                    .get_message(&id)?
                    .ok_or_else(|| anyhow::anyhow!("Message not found: {}", id))?;
                if row.receiver_id != reader {
                    anyhow::bail!("Only the receiver can mark message {} read", id);
                }
                db.update_message_status(&id, DeliveryStatus::Read.as_str())
            })
            .await?;

        self.dispatcher
            .send_to_members(
                &row.sender_id,
                &row.receiver_id,
                ServerEvent::MessageStatus {
                    message_id: row.id.clone(),
                    status: DeliveryStatus::Read,
                },
            )
            .await;

        Ok(row)
    }

    /// History of the conversation between two users, oldest first.
    pub async fn history_between(&self, user_id: &str, other_id: &str) -> Result<Vec<MessageRow>> {
        let (a, b) = (user_id.to_string(), other_id.to_string());
        self.with_db(move |db| {
            let conversation = db.find_or_create_conversation(&a, &b)?;
            db.get_messages(&conversation.id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GatewayState {
        GatewayState::new(Database::open_in_memory().unwrap())
    }

    fn outbound(sender: &str, receiver: &str, body: &str) -> OutboundMessage {
        OutboundMessage {
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            body: body.into(),
            client_id: Some("corr-9".into()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn post_message_relays_to_both_members() {
        let state = state();
        let (_, mut customer_rx) = state.dispatcher.register_user_channel("customer").await;
        let (_, mut agent_rx) = state.dispatcher.register_user_channel("agent").await;

        let row = state.post_message(outbound("customer", "agent", "hello")).await.unwrap();
        assert_eq!(row.status, "delivered");

        for rx in [&mut customer_rx, &mut agent_rx] {
            match rx.recv().await {
                Some(ServerEvent::NewMessage(raw)) => {
                    assert_eq!(raw.id, row.id);
                    assert_eq!(raw.client_id.as_deref(), Some("corr-9"));
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn offline_receiver_leaves_status_sent() {
        let state = state();
        let row = state.post_message(outbound("customer", "agent", "anyone?")).await.unwrap();
        assert_eq!(row.status, "sent");

        let history = state.history_between("agent", "customer").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "anyone?");
    }

    #[tokio::test]
    async fn only_receiver_marks_read() {
        let state = state();
        let row = state.post_message(outbound("customer", "agent", "hello")).await.unwrap();

        assert!(state.mark_read("customer", &row.id).await.is_err());

        let updated = state.mark_read("agent", &row.id).await.unwrap();
        assert_eq!(updated.status, "read");
    }
}
