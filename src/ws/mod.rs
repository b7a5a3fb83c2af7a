//! WebSocket adapter for the session transport
//!
//! One socket per participant. Outbound traffic comes from the participant's
//! `ChannelTransport` queue; inbound frames are parsed into `ClientMessage`s
//! and handed to the session under the socket's own participant id.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::Session;
use crate::transport::{ChannelTransport, SessionTransport};

/// Shared state of the WebSocket route
pub struct WsState {
    pub session: Arc<Session>,
    pub transport: Arc<ChannelTransport>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (mut sender, mut receiver) = socket.split();

    let (id, mut outbound) = state.transport.register().await;
    state.session.connect(id).await;

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(msg) = queued else { break };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to encode message for {}: {}", id, e),
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("{} sent: {}", id, text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => state.session.handle_message(id, client_msg).await,
                            Err(e) => {
                                tracing::warn!("Failed to parse message from {}: {}", id, e);
                                state
                                    .transport
                                    .send_to(
                                        id,
                                        ServerMessage::Error {
                                            code: "PARSE_ERROR".to_string(),
                                            msg: format!("Invalid message format: {}", e),
                                        },
                                    )
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error for {}: {}", id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.transport.unregister(id).await;
    state.session.disconnect(id).await;
    tracing::info!("WebSocket closed for {}", id);
}
