use tracing::{debug, info, warn};

use aligna_types::events::{ClientCommand, ServerEvent};
use aligna_types::models::DeliveryStatus;

use crate::config::ChatConfig;
use crate::connection::Connection;
use crate::conversation::{Conversation, Incoming, Message};
use crate::error::Result;
use crate::typing::TypingSignaler;

/// A visible change produced by one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    /// A message from the server that was not displayed before.
    MessageAdded(Message),
    /// A provisional message got its server id.
    MessageConfirmed(Message),
    StatusChanged {
        message_id: String,
        status: DeliveryStatus,
    },
    /// The history bootstrap finished; the list now holds this many messages.
    HistoryLoaded(usize),
    AgentTyping(bool),
    ServerError(String),
}

/// A support conversation between the signed-in user and the agent.
///
/// Owns its gateway connection, the conversation state and the typing
/// debounce. Built only once the user id is known; there is no shared
/// instance.
pub struct ChatSession {
    typing: TypingSignaler,
    conversation: Conversation,
    connection: Connection,
}

impl ChatSession {
    /// Connect, then request the conversation history.
    pub async fn start(config: &ChatConfig) -> Result<Self> {
        let connection = Connection::connect(config).await?;
        let conversation = Conversation::new(connection.user_id(), config.agent_id.clone());
        let typing = TypingSignaler::spawn(
            config.agent_id.clone(),
            connection.command_sender(),
            config.typing_idle,
        );

        connection.send(ClientCommand::GetMessages {
            receiver_id: config.agent_id.clone(),
        })?;

        info!("Chat session started with agent {}", config.agent_id);
        Ok(Self {
            typing,
            conversation,
            connection,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// Display `text` immediately and send it. Blank input does nothing and
    /// returns `None`. A failed send leaves the provisional message in place.
    pub fn send_message(&mut self, text: &str) -> Result<Option<Message>> {
        let Some((staged, command)) = self.conversation.stage_outgoing(text) else {
            return Ok(None);
        };
        let staged = staged.clone();
        self.connection.send(command)?;
        Ok(Some(staged))
    }

    /// Call on every change of the input field.
    pub fn input_changed(&self) {
        self.typing.input_changed();
    }

    /// Tell the server a received message was read.
    pub fn mark_read(&self, message_id: &str) -> Result<()> {
        self.connection.send(ClientCommand::MarkRead {
            message_id: message_id.to_string(),
        })
    }

    /// Wait for the next event that changes what is displayed.
    /// Returns `None` once the connection has closed.
    pub async fn next_update(&mut self) -> Option<ChatUpdate> {
        loop {
            let event = self.connection.next_event().await?;
            if let Some(update) = apply_event(&mut self.conversation, event) {
                return Some(update);
            }
        }
    }

    /// End the session: close any open typing period, then close the connection.
    pub async fn close(self) {
        let Self {
            typing,
            conversation: _,
            mut connection,
        } = self;
        typing.finish().await;
        connection.disconnect().await;
    }
}

/// Apply one gateway event to the conversation.
pub(crate) fn apply_event(conversation: &mut Conversation, event: ServerEvent) -> Option<ChatUpdate> {
    match event {
        ServerEvent::NewMessage(raw) => match conversation.apply_incoming(raw) {
            Incoming::Appended(idx) => {
                Some(ChatUpdate::MessageAdded(conversation.messages()[idx].clone()))
            }
            Incoming::Confirmed(idx) => {
                Some(ChatUpdate::MessageConfirmed(conversation.messages()[idx].clone()))
            }
            Incoming::Duplicate(_) | Incoming::OutOfScope => None,
        },
        ServerEvent::MessageStatus { message_id, status } => {
            if conversation.apply_status(&message_id, status) {
                Some(ChatUpdate::StatusChanged { message_id, status })
            } else {
                debug!("Status for unknown message {}", message_id);
                None
            }
        }
        ServerEvent::LoadMessages(history) => {
            conversation.apply_history(history);
            Some(ChatUpdate::HistoryLoaded(conversation.messages().len()))
        }
        ServerEvent::UserTyping { user_id } => conversation
            .apply_typing(&user_id, true)
            .then_some(ChatUpdate::AgentTyping(true)),
        ServerEvent::UserStopTyping { user_id } => conversation
            .apply_typing(&user_id, false)
            .then_some(ChatUpdate::AgentTyping(false)),
        ServerEvent::Error { message } => {
            warn!("Server reported: {}", message);
            Some(ChatUpdate::ServerError(message))
        }
        ServerEvent::Ready { user_id } => {
            debug!("Late ready for {}", user_id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aligna_types::models::RawMessage;
    use chrono::Utc;

    fn raw(id: &str, sender: &str, receiver: &str, client_id: Option<String>) -> RawMessage {
        RawMessage {
            id: id.into(),
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            message: "hello".into(),
            created_at: Utc::now(),
            status: Some(DeliveryStatus::Sent),
            client_id,
        }
    }

    #[test]
    fn echo_confirms_instead_of_appending() {
        let mut conversation = Conversation::new("u1", "agent");
        let (_, command) = conversation.stage_outgoing("hello").unwrap();
        let ClientCommand::SendMessage { client_id, .. } = command else {
            panic!("expected sendMessage");
        };

        let update = apply_event(
            &mut conversation,
            ServerEvent::NewMessage(raw("m42", "u1", "agent", client_id)),
        );
        match update {
            Some(ChatUpdate::MessageConfirmed(msg)) => {
                assert_eq!(msg.id, "m42");
                assert!(!msg.provisional);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn duplicates_and_strangers_are_silent() {
        let mut conversation = Conversation::new("u1", "agent");
        let first = apply_event(&mut conversation, ServerEvent::NewMessage(raw("m1", "agent", "u1", None)));
        assert!(matches!(first, Some(ChatUpdate::MessageAdded(_))));

        let again = apply_event(&mut conversation, ServerEvent::NewMessage(raw("m1", "agent", "u1", None)));
        assert_eq!(again, None);
        let stranger = apply_event(&mut conversation, ServerEvent::NewMessage(raw("m2", "x", "u1", None)));
        assert_eq!(stranger, None);
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn typing_updates_only_on_change() {
        let mut conversation = Conversation::new("u1", "agent");
        let start = ServerEvent::UserTyping { user_id: "agent".into() };
        assert_eq!(apply_event(&mut conversation, start.clone()), Some(ChatUpdate::AgentTyping(true)));
        assert_eq!(apply_event(&mut conversation, start), None);
        assert_eq!(
            apply_event(&mut conversation, ServerEvent::UserTyping { user_id: "someone".into() }),
            None
        );
        assert_eq!(
            apply_event(&mut conversation, ServerEvent::UserStopTyping { user_id: "agent".into() }),
            Some(ChatUpdate::AgentTyping(false))
        );
    }

    #[test]
    fn status_for_unknown_message_is_dropped() {
        let mut conversation = Conversation::new("u1", "agent");
        apply_event(&mut conversation, ServerEvent::LoadMessages(vec![raw("m1", "u1", "agent", None)]));

        let unknown = ServerEvent::MessageStatus {
            message_id: "nope".into(),
            status: DeliveryStatus::Read,
        };
        assert_eq!(apply_event(&mut conversation, unknown), None);

        let known = ServerEvent::MessageStatus {
            message_id: "m1".into(),
            status: DeliveryStatus::Read,
        };
        assert_eq!(
            apply_event(&mut conversation, known),
            Some(ChatUpdate::StatusChanged {
                message_id: "m1".into(),
                status: DeliveryStatus::Read
            })
        );
    }

    #[test]
    fn history_reports_merged_length() {
        let mut conversation = Conversation::new("u1", "agent");
        conversation.stage_outgoing("pending").unwrap();
        let update = apply_event(
            &mut conversation,
            ServerEvent::LoadMessages(vec![raw("m1", "agent", "u1", None), raw("m2", "u1", "agent", None)]),
        );
        assert_eq!(update, Some(ChatUpdate::HistoryLoaded(3)));
    }
}
