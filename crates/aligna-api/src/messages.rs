use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use aligna_db::models::ConversationRow;
use aligna_gateway::state::OutboundMessage;
use aligna_types::api::{Claims, SendMessageRequest};
use aligna_types::models::MessageRecord;

use crate::auth::AppState;
use crate::error::ApiError;

async fn load_conversation(state: &AppState, conversation_id: String) -> Result<ConversationRow, ApiError> {
    state
        .gateway
        .with_db(move |db| db.get_conversation(&conversation_id))
        .await?
        .ok_or(ApiError::NotFound)
}

/// `POST /message/send`: store a message and push it to both members over the gateway.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.sender != claims.sub {
        return Err(ApiError::Forbidden);
    }
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is empty".into()));
    }

    let conversation = load_conversation(&state, req.conversation_id).await?;
    if !conversation.has_member(&req.sender) {
        return Err(ApiError::Forbidden);
    }
    let receiver_id = if conversation.member_a == req.sender {
        conversation.member_b.clone()
    } else {
        conversation.member_a.clone()
    };

    let row = state
        .gateway
        .post_message(OutboundMessage {
            sender_id: req.sender,
            receiver_id,
            body: req.text,
            client_id: None,
            created_at: chrono::Utc::now(),
        })
        .await?;

    debug!("REST message {} in conversation {}", row.id, row.conversation_id);

    Ok((StatusCode::CREATED, Json(row.to_record())))
}

/// `GET /message/{conversation_id}/{user_id}`: full history, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path((conversation_id, user_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id != claims.sub {
        return Err(ApiError::Forbidden);
    }

    let conversation = load_conversation(&state, conversation_id).await?;
    if !conversation.has_member(&user_id) {
        return Err(ApiError::Forbidden);
    }

    let rows = state
        .gateway
        .with_db(move |db| db.get_messages(&conversation.id))
        .await?;

    let messages: Vec<MessageRecord> = rows.iter().map(|row| row.to_record()).collect();
    Ok(Json(messages))
}
