use axum::{Extension, Json, extract::State, response::IntoResponse};

use aligna_types::api::{Claims, CreateConversationRequest};

use crate::auth::AppState;
use crate::error::ApiError;

/// `POST /conversation`: find or create the conversation between two members.
/// The caller must be one of them.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let [first, second] = <[String; 2]>::try_from(req.members)
        .map_err(|_| ApiError::BadRequest("members must contain exactly two ids".into()))?;

    if first != claims.sub && second != claims.sub {
        return Err(ApiError::Forbidden);
    }

    let conversation = state
        .gateway
        .with_db(move |db| db.find_or_create_conversation(&first, &second))
        .await?;

    Ok(Json(conversation.to_record()))
}
