use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use aligna_types::events::{ClientCommand, ServerEvent};

use crate::state::{GatewayState, OutboundMessage};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated gateway connection.
/// The bearer token was validated at the HTTP upgrade layer, so the user id
/// is trusted here.
pub async fn handle_connection(socket: WebSocket, state: GatewayState, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} connected to gateway", user_id);

    let ready = ServerEvent::Ready {
        user_id: user_id.clone(),
    };
    match serde_json::to_string(&ready) {
        Ok(text) => {
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        Err(e) => {
            warn!("Failed to encode ready event: {}", e);
            return;
        }
    }

    let (conn_id, mut user_rx) = state.dispatcher.register_user_channel(&user_id).await;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = sender.close().await;
    });

    // Read commands from client
    let state_recv = state.clone();
    let user_recv = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(cmd) => handle_command(&state_recv, &user_recv, cmd).await,
                    Err(e) => {
                        let raw: String = text.as_str().chars().take(200).collect();
                        warn!("{} bad command: {} -- raw: {}", user_recv, e, raw);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.dispatcher.unregister_user_channel(&user_id, conn_id).await;
    info!("{} disconnected from gateway", user_id);
}

async fn handle_command(state: &GatewayState, user_id: &str, cmd: ClientCommand) {
    debug!("{} -> {}", user_id, cmd.name());

    match cmd {
        ClientCommand::SendMessage {
            message,
            sender_id,
            receiver_id,
            created_at,
            client_id,
        } => {
            if sender_id != user_id {
                warn!("{} tried to send as {}", user_id, sender_id);
                report_error(state, user_id, "senderId does not match the connected user").await;
                return;
            }
            if message.trim().is_empty() {
                report_error(state, user_id, "message is empty").await;
                return;
            }

            let outbound = OutboundMessage {
                sender_id,
                receiver_id,
                body: message,
                client_id,
                created_at,
            };
            if let Err(e) = state.post_message(outbound).await {
                warn!("{} sendMessage failed: {:#}", user_id, e);
                report_error(state, user_id, "message could not be stored").await;
            }
        }

        ClientCommand::Typing { receiver_id } => {
            state
                .dispatcher
                .send_to_user(&receiver_id, ServerEvent::UserTyping { user_id: user_id.to_string() })
                .await;
        }

        ClientCommand::StopTyping { receiver_id } => {
            state
                .dispatcher
                .send_to_user(
                    &receiver_id,
                    ServerEvent::UserStopTyping { user_id: user_id.to_string() },
                )
                .await;
        }

        ClientCommand::GetMessages { receiver_id } => {
            match state.history_between(user_id, &receiver_id).await {
                Ok(rows) => {
                    let history = rows.iter().map(|row| row.to_raw()).collect();
                    state
                        .dispatcher
                        .send_to_user(user_id, ServerEvent::LoadMessages(history))
                        .await;
                }
                Err(e) => {
                    warn!("{} getMessages failed: {:#}", user_id, e);
                    report_error(state, user_id, "history could not be loaded").await;
                }
            }
        }

        ClientCommand::MarkRead { message_id } => {
            if let Err(e) = state.mark_read(user_id, &message_id).await {
                warn!("{} markRead {} failed: {:#}", user_id, message_id, e);
                report_error(state, user_id, "message could not be marked read").await;
            }
        }
    }
}

async fn report_error(state: &GatewayState, user_id: &str, message: &str) {
    state
        .dispatcher
        .send_to_user(
            user_id,
            ServerEvent::Error {
                message: message.to_string(),
            },
        )
        .await;
}
