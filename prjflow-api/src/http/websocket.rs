//! Ticket side channel
//!
//! The page that shows a QR code opens `/ws?ticket=...` and receives every
//! message the callback pipeline publishes for that ticket as a JSON text
//! frame. The socket closes after the terminal (success or error) message,
//! when the client goes away, or after the idle timeout.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use prjflow_core::service::TicketSubscription;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::http::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub ticket: Option<String>,
}

pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let ticket = query
        .ticket
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing ticket query parameter"))?;

    // subscribe before the upgrade completes so nothing published meanwhile is lost
    let subscription = state.hub.subscribe(&ticket);
    let idle_timeout = state.ws_idle_timeout;

    Ok(ws.on_upgrade(move |socket| forward(socket, subscription, idle_timeout)))
}

async fn forward(socket: WebSocket, mut subscription: TicketSubscription, idle_timeout: Duration) {
    let (mut sender, mut receiver) = socket.split();
    debug!(ticket = %subscription.ticket(), "Ticket socket opened");

    loop {
        tokio::select! {
            message = subscription.recv() => {
                let Some(message) = message else { break };
                let terminal = message.kind.is_terminal();
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode ticket message: {}", e);
                        break;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
                if terminal {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                // client frames carry nothing; they only keep the socket alive
                Some(Ok(_)) => {}
            },
            () = tokio::time::sleep(idle_timeout) => {
                debug!(ticket = %subscription.ticket(), "Ticket socket idle, closing");
                break;
            }
        }
    }

    if let Err(e) = sender.send(Message::Close(None)).await {
        debug!("Close frame not delivered: {}", e);
    }
    debug!(ticket = %subscription.ticket(), "Ticket socket closed");
}
