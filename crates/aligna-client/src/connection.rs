use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use aligna_types::events::{ClientCommand, ServerEvent};

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

/// One persistent gateway connection for one user.
///
/// A reader task parses inbound frames into [`ServerEvent`]s and a writer task
/// drains outbound [`ClientCommand`]s. There is no reconnection: once the
/// transport drops, `next_event` returns `None` and `is_open` turns false.
/// Dropping the connection without [`disconnect`](Self::disconnect) still
/// delivers commands queued before the drop.
pub struct Connection {
    user_id: String,
    outbound: mpsc::UnboundedSender<ClientCommand>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    open: Arc<AtomicBool>,
    close_tx: Option<oneshot::Sender<()>>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Open the gateway connection and wait for the server's `ready` frame.
    pub async fn connect(config: &ChatConfig) -> Result<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(config.gateway_url()).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let user_id = tokio::time::timeout(config.handshake_timeout, wait_for_ready(&mut ws_rx))
            .await
            .map_err(|_| ChatError::Handshake("timed out waiting for ready".into()))??;

        if user_id != config.user_id {
            let _ = ws_tx.close().await;
            return Err(ChatError::IdentityMismatch {
                expected: config.user_id.clone(),
                actual: user_id,
            });
        }

        info!("Connected to gateway as {}", user_id);

        let open = Arc::new(AtomicBool::new(true));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientCommand>();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    cmd = outbound_rx.recv() => {
                        let Some(cmd) = cmd else { break };
                        let text = match serde_json::to_string(&cmd) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to encode {}: {}", cmd.name(), e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                            // Fire and forget: the command is lost with the transport.
                            warn!("Dropping {}: {}", cmd.name(), e);
                            break;
                        }
                    }
                    // A dropped sender disables this branch; only disconnect() sends
                    Ok(()) = &mut close_rx => break,
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader_open = open.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let raw: String = text.as_str().chars().take(200).collect();
                            warn!("Bad gateway event: {} -- raw: {}", e, raw);
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Gateway transport error: {}", e);
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::Release);
            info!("Gateway connection closed");
        });

        Ok(Self {
            user_id,
            outbound,
            events,
            open,
            close_tx: Some(close_tx),
            writer,
            reader,
        })
    }

    /// The user id confirmed by the server.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue a command without waiting for it to be written.
    pub fn send(&self, cmd: ClientCommand) -> Result<()> {
        if !self.is_open() {
            return Err(ChatError::Closed);
        }
        self.outbound.send(cmd).map_err(|_| ChatError::Closed)
    }

    /// A handle for components that emit commands on their own (typing).
    pub fn command_sender(&self) -> mpsc::UnboundedSender<ClientCommand> {
        self.outbound.clone()
    }

    /// Next inbound event, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Close the connection. Commands already queued are flushed first.
    pub async fn disconnect(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
            let _ = (&mut self.writer).await;
        }
        self.reader.abort();
        self.open.store(false, Ordering::Release);
        self.events.close();
        debug!("Disconnected {}", self.user_id);
    }
}

async fn wait_for_ready<S>(ws_rx: &mut S) -> Result<String>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = ws_rx.next().await {
        match frame? {
            Message::Text(text) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                Ok(ServerEvent::Ready { user_id }) => return Ok(user_id),
                Ok(other) => debug!("Ignoring {:?} before ready", other),
                Err(e) => warn!("Bad frame before ready: {}", e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(ChatError::Handshake("connection closed before ready".into()))
}

impl Drop for Connection {
    /// The writer is left running: it flushes whatever is still queued
    /// (a final `stopTyping`) and closes the socket once every command
    /// sender is gone.
    fn drop(&mut self) {
        self.reader.abort();
    }
}
