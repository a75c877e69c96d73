use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use aligna_api::auth::{self, AppState, AppStateInner};
use aligna_api::error::ApiError;
use aligna_api::middleware::{require_auth, verify_token};
use aligna_api::{conversations, messages};
use aligna_db::Database;
use aligna_gateway::connection;
use aligna_gateway::state::GatewayState;

/// Build the shared state for a server backed by `db`.
pub fn app_state(db: Database, jwt_secret: String) -> AppState {
    Arc::new(AppStateInner {
        gateway: GatewayState::new(db),
        jwt_secret,
    })
}

/// Assemble REST and gateway routes.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/conversation", post(conversations::create_conversation))
        .route("/message/send", post(messages::send_message))
        .route("/message/{conversation_id}/{user_id}", get(messages::get_messages))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

/// Validate the token before upgrading, so the connection loop starts authenticated.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = verify_token(&state.jwt_secret, &query.token).inspect_err(|_| {
        warn!("Rejected gateway connection with invalid token");
    })?;

    let gateway = state.gateway.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, gateway, claims.sub)))
}
