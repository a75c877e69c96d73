//! Local view of the support conversation.
//!
//! All state changes driven by the gateway go through [`Conversation`]:
//! provisional sends, inbound messages, status updates, the history
//! bootstrap and the agent's typing indicator. It does no I/O, the session
//! feeds it events one at a time.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

use aligna_types::events::ClientCommand;
use aligna_types::models::{DeliveryStatus, RawMessage};

/// Prefix of the temporary ids given to messages the server has not confirmed yet.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Whether a message was written by the local user or by the other party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// A message as displayed in the chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Server id, or `local-<n>` while provisional.
    pub id: String,
    /// Correlation id for messages created on this client.
    pub client_id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub status: Option<DeliveryStatus>,
    /// True until the server echo for this message arrives.
    pub provisional: bool,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        Self {
            id: raw.id,
            client_id: raw.client_id,
            sender_id: raw.sender_id,
            receiver_id: raw.receiver_id,
            text: raw.message,
            created_at: raw.created_at,
            status: raw.status,
            provisional: false,
        }
    }
}

/// What applying an inbound `newMessage` did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    /// A new message was appended at this index.
    Appended(usize),
    /// The provisional message at this index was confirmed by the server.
    Confirmed(usize),
    /// The message was already displayed.
    Duplicate(usize),
    /// The message belongs to another pair of participants.
    OutOfScope,
}

/// The conversation between the local user and the support agent.
#[derive(Debug)]
pub struct Conversation {
    local_user_id: String,
    agent_id: String,
    messages: Vec<Message>,
    next_seq: u64,
    agent_typing: bool,
}

impl Conversation {
    pub fn new(local_user_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            agent_id: agent_id.into(),
            messages: Vec::new(),
            next_seq: 0,
            agent_typing: false,
        }
    }

    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn agent_typing(&self) -> bool {
        self.agent_typing
    }

    pub fn direction(&self, message: &Message) -> Direction {
        if message.sender_id == self.local_user_id {
            Direction::Sent
        } else {
            Direction::Received
        }
    }

    fn in_scope(&self, sender_id: &str, receiver_id: &str) -> bool {
        let member = |id: &str| id == self.local_user_id || id == self.agent_id;
        member(sender_id) && member(receiver_id)
    }

    /// Append a provisional message for `text` and build the matching
    /// `sendMessage` command. Returns `None` when the trimmed text is empty.
    pub fn stage_outgoing(&mut self, text: &str) -> Option<(&Message, ClientCommand)> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.next_seq += 1;
        let client_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let command = ClientCommand::SendMessage {
            message: text.to_string(),
            sender_id: self.local_user_id.clone(),
            receiver_id: self.agent_id.clone(),
            created_at,
            client_id: Some(client_id.clone()),
        };

        self.messages.push(Message {
            id: format!("{}{}", LOCAL_ID_PREFIX, self.next_seq),
            client_id: Some(client_id),
            sender_id: self.local_user_id.clone(),
            receiver_id: self.agent_id.clone(),
            text: text.to_string(),
            created_at,
            status: None,
            provisional: true,
        });

        let staged = self.messages.last()?;
        Some((staged, command))
    }

    /// Apply an inbound `newMessage`.
    pub fn apply_incoming(&mut self, raw: RawMessage) -> Incoming {
        if !self.in_scope(&raw.sender_id, &raw.receiver_id) {
            trace!("Ignoring message {} between {} and {}", raw.id, raw.sender_id, raw.receiver_id);
            return Incoming::OutOfScope;
        }

        if let Some(client_id) = raw.client_id.as_deref() {
            let pending = self
                .messages
                .iter()
                .position(|m| m.provisional && m.client_id.as_deref() == Some(client_id));
            if let Some(idx) = pending {
                let msg = &mut self.messages[idx];
                debug!("Confirmed {} as {}", msg.id, raw.id);
                msg.id = raw.id;
                msg.created_at = raw.created_at;
                msg.status = raw.status;
                msg.provisional = false;
                return Incoming::Confirmed(idx);
            }
        }

        if let Some(idx) = self.messages.iter().position(|m| m.id == raw.id) {
            if raw.status.is_some() {
                self.messages[idx].status = raw.status;
            }
            return Incoming::Duplicate(idx);
        }

        self.messages.push(raw.into());
        Incoming::Appended(self.messages.len() - 1)
    }

    /// Apply a `messageStatus` event. Returns false when no message matches.
    pub fn apply_status(&mut self, message_id: &str, status: DeliveryStatus) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(msg) => {
                msg.status = Some(status);
                true
            }
            None => false,
        }
    }

    /// Install the server's history.
    ///
    /// The server list becomes the base of the display list. Local entries it
    /// does not contain (provisional messages not yet echoed, live messages
    /// newer than the snapshot) are kept after it in their current order.
    pub fn apply_history(&mut self, history: Vec<RawMessage>) {
        let mut merged: Vec<Message> = history.into_iter().map(Message::from).collect();
        let server_len = merged.len();

        for local in self.messages.drain(..) {
            let known = merged[..server_len].iter().any(|m| {
                m.id == local.id
                    || (local.client_id.is_some() && m.client_id == local.client_id)
            });
            if !known {
                merged.push(local);
            }
        }

        debug!(
            "History loaded: {} from server, {} kept locally",
            server_len,
            merged.len() - server_len
        );
        self.messages = merged;
    }

    /// Apply `userTyping` / `userStopTyping`. Only the agent's events count.
    /// Returns true when the indicator changed.
    pub fn apply_typing(&mut self, user_id: &str, typing: bool) -> bool {
        if user_id != self.agent_id {
            trace!("Ignoring typing event from {}", user_id);
            return false;
        }
        let changed = self.agent_typing != typing;
        self.agent_typing = typing;
        changed
    }
}
