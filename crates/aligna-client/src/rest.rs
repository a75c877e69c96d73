use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use aligna_types::api::{AuthResponse, CreateConversationRequest, LoginRequest, RegisterRequest, SendMessageRequest};
use aligna_types::models::{ConversationRecord, MessageRecord};

use crate::error::{ChatError, Result};

/// Client for the REST half of the chat server.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// `POST /auth/register`
    pub async fn register(base_url: &str, username: &str, password: &str) -> Result<AuthResponse> {
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        Self::auth_request(base_url, "/auth/register", &body).await
    }

    /// `POST /auth/login`
    pub async fn login(base_url: &str, username: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        Self::auth_request(base_url, "/auth/login", &body).await
    }

    async fn auth_request<B: Serialize>(base_url: &str, path: &str, body: &B) -> Result<AuthResponse> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        let resp = Client::new().post(&url).json(body).send().await?;
        decode(resp).await
    }

    /// `POST /conversation`: find or create the conversation between two users.
    pub async fn create_conversation(&self, members: [&str; 2]) -> Result<ConversationRecord> {
        let body = CreateConversationRequest {
            members: members.iter().map(|m| m.to_string()).collect(),
        };
        self.post("/conversation", &body).await
    }

    /// `POST /message/send`
    pub async fn send_message(&self, conversation_id: &str, sender: &str, text: &str) -> Result<MessageRecord> {
        let body = SendMessageRequest {
            conversation_id: conversation_id.to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
        };
        self.post("/message/send", &body).await
    }

    /// `GET /message/{conversation_id}/{user_id}`, oldest first.
    pub async fn get_messages(&self, conversation_id: &str, user_id: &str) -> Result<Vec<MessageRecord>> {
        let url = format!("{}/message/{}/{}", self.base_url, conversation_id, user_id);
        debug!("GET {}", url);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        decode(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Fail on non-2xx, then parse the body. A 2xx with a body that is not
/// the expected shape is a [`ChatError::Json`], not an HTTP error.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp.error_for_status()?.text().await?;
    parse_body(&body)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        let raw: String = body.chars().take(200).collect();
        warn!("Unexpected response body: {} -- raw: {}", e, raw);
        ChatError::Json(e)
    })
}
