use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use aligna_types::events::ServerEvent;

/// Routes gateway events to connected users.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<String, (Uuid, mpsc::UnboundedSender<ServerEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    ///
    /// A newer connection for the same user replaces the older one; the old
    /// connection's receiver closes and its loop ends.
    pub async fn register_user_channel(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id.to_string(), (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches.
    pub async fn unregister_user_channel(&self, user_id: &str, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(user_id);
            }
        }
    }

    /// Send a targeted event to a specific user. Returns whether a live
    /// connection accepted it.
    pub async fn send_to_user(&self, user_id: &str, event: ServerEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        match channels.get(user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Send an event to both members of a conversation (once if they are the same user).
    pub async fn send_to_members(&self, user_a: &str, user_b: &str, event: ServerEvent) {
        if user_a != user_b {
            self.send_to_user(user_b, event.clone()).await;
        }
        self.send_to_user(user_a, event).await;
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.user_channels.read().await.contains_key(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(user_id: &str) -> ServerEvent {
        ServerEvent::UserTyping { user_id: user_id.into() }
    }

    #[tokio::test]
    async fn newer_connection_takes_over() {
        let dispatcher = Dispatcher::new();
        let (old_conn, mut old_rx) = dispatcher.register_user_channel("customer").await;
        let (new_conn, mut new_rx) = dispatcher.register_user_channel("customer").await;

        // Old sender was replaced, so its receiver is closed.
        assert!(old_rx.recv().await.is_none());

        // Stale teardown must not remove the new registration.
        dispatcher.unregister_user_channel("customer", old_conn).await;
        assert!(dispatcher.is_online("customer").await);

        assert!(dispatcher.send_to_user("customer", typing("agent")).await);
        assert_eq!(new_rx.recv().await, Some(typing("agent")));

        dispatcher.unregister_user_channel("customer", new_conn).await;
        assert!(!dispatcher.is_online("customer").await);
        assert!(!dispatcher.send_to_user("customer", typing("agent")).await);
    }

    #[tokio::test]
    async fn members_receive_one_copy_each() {
        let dispatcher = Dispatcher::new();
        let (_, mut customer_rx) = dispatcher.register_user_channel("customer").await;
        let (_, mut agent_rx) = dispatcher.register_user_channel("agent").await;

        dispatcher.send_to_members("customer", "agent", typing("x")).await;
        assert_eq!(customer_rx.try_recv().ok(), Some(typing("x")));
        assert_eq!(agent_rx.try_recv().ok(), Some(typing("x")));
        assert!(customer_rx.try_recv().is_err());

        dispatcher.send_to_members("customer", "customer", typing("y")).await;
        assert_eq!(customer_rx.try_recv().ok(), Some(typing("y")));
        assert!(customer_rx.try_recv().is_err());
    }
}
