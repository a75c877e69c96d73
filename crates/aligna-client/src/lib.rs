/// Aligna support chat client.
///
/// Connects a signed-in user to a support agent over the chat gateway:
/// - one persistent WebSocket connection per session, confirmed by a `ready` frame
/// - provisional local echo, reconciled with the server echo by correlation id
/// - debounced typing signals with a final `stopTyping` on teardown
/// - history bootstrap merged with what is already displayed

pub mod config;
pub mod connection;
pub mod conversation;
pub mod error;
pub mod rest;
pub mod session;
pub mod typing;

pub use config::ChatConfig;
pub use conversation::{Conversation, Direction, Message};
pub use error::{ChatError, Result};
pub use rest::RestClient;
pub use session::{ChatSession, ChatUpdate};
