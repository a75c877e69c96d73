use std::time::Duration;

use crate::error::{ChatError, Result};

/// Idle time after the last keystroke before `stopTyping` is sent.
pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_secs(1);

/// How long `connect` waits for the server's `ready` frame.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for one chat session.
///
/// The user id is required: a session is only built once the signed-in
/// user is known, there is no fallback identity.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base HTTP URL of the chat server, e.g. `http://localhost:3000`.
    pub server_url: String,
    /// Bearer token for REST calls and the gateway upgrade.
    pub token: String,
    pub user_id: String,
    /// The support agent on the other end of the conversation.
    pub agent_id: String,
    pub typing_idle: Duration,
    pub handshake_timeout: Duration,
}

impl ChatConfig {
    pub fn new(
        server_url: impl Into<String>,
        token: impl Into<String>,
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            typing_idle: DEFAULT_TYPING_IDLE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_typing_idle(mut self, idle: Duration) -> Self {
        self.typing_idle = idle;
        self
    }

    /// Load from `ALIGNA_*` environment variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ChatError::MissingConfig(key))
        };

        let mut config = Self::new(
            required("ALIGNA_SERVER_URL")?,
            required("ALIGNA_TOKEN")?,
            required("ALIGNA_USER_ID")?,
            required("ALIGNA_AGENT_ID")?,
        );

        if let Some(raw) = lookup("ALIGNA_TYPING_IDLE_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| ChatError::InvalidConfig {
                key: "ALIGNA_TYPING_IDLE_MS",
                value: raw.clone(),
            })?;
            config.typing_idle = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// WebSocket URL of the gateway for this session's token.
    pub fn gateway_url(&self) -> String {
        format!(
            "{}/gateway?token={}",
            self.server_url
                .replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1),
            self.token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 4] = [
        ("ALIGNA_SERVER_URL", "https://chat.example.com/"),
        ("ALIGNA_TOKEN", "tok"),
        ("ALIGNA_USER_ID", "u1"),
        ("ALIGNA_AGENT_ID", "agent"),
    ];

    #[test]
    fn loads_required_values() {
        let config = ChatConfig::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.server_url, "https://chat.example.com");
        assert_eq!(config.user_id, "u1");
        assert_eq!(config.typing_idle, DEFAULT_TYPING_IDLE);
        assert_eq!(config.gateway_url(), "wss://chat.example.com/gateway?token=tok");
    }

    #[test]
    fn missing_user_id_is_an_error() {
        let pairs: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != "ALIGNA_USER_ID").collect();
        let err = ChatConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ChatError::MissingConfig("ALIGNA_USER_ID")));

        let mut blank = BASE.to_vec();
        blank[2] = ("ALIGNA_USER_ID", "  ");
        assert!(ChatConfig::from_lookup(lookup(&blank)).is_err());
    }

    #[test]
    fn typing_idle_override() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ALIGNA_TYPING_IDLE_MS", "250"));
        let config = ChatConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.typing_idle, Duration::from_millis(250));

        pairs.pop();
        pairs.push(("ALIGNA_TYPING_IDLE_MS", "soon"));
        assert!(matches!(
            ChatConfig::from_lookup(lookup(&pairs)),
            Err(ChatError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn plain_http_maps_to_ws() {
        let config = ChatConfig::new("http://127.0.0.1:3000", "t", "u1", "agent");
        assert_eq!(config.gateway_url(), "ws://127.0.0.1:3000/gateway?token=t");
    }
}
