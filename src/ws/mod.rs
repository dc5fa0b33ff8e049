pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::gateway::{EventGateway, WsGateway};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;

/// Axum state for the connection layer: the core state plus the gateway the
/// dispatcher emits through
#[derive(Clone)]
pub struct ServerContext {
    pub state: Arc<AppState>,
    pub gateway: Arc<WsGateway>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<ServerContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, ctx: ServerContext) {
    let conn_id: ConnectionId = ulid::Ulid::new().to_string();
    tracing::info!("Client connected: {}", conn_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    ctx.gateway.register(&conn_id, tx).await;

    loop {
        tokio::select! {
            // Outbound events routed here by the gateway
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::error!("Failed to encode outbound event: {}", e),
                    },
                    None => break,
                }
            }

            // Inbound client frames
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                handlers::handle_message(
                                    &ctx.state,
                                    ctx.gateway.as_ref(),
                                    &conn_id,
                                    msg,
                                )
                                .await;
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                ctx.gateway
                                    .send_to(
                                        &conn_id,
                                        ServerMessage::Error {
                                            message: format!("Invalid message format: {}", e),
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
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("Client disconnected: {}", conn_id);
    handlers::handle_disconnect(&ctx.state, ctx.gateway.as_ref(), &conn_id).await;
    ctx.gateway.unregister(&conn_id).await;
}
