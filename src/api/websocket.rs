//! Live-viewer transport: forwards the broadcast feed over WebSocket.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pump every broadcast event to one connected viewer as a JSON text frame.
///
/// A viewer that falls behind the broadcast buffer misses the skipped
/// events; that staleness is bounded and accepted for this channel, so the
/// connection stays up and continues from the current position.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut feed = state.pipeline.live_feed().subscribe();
    let (mut sender, mut receiver) = socket.split();

    debug!("Live viewer connected");

    loop {
        tokio::select! {
            event = feed.recv() => {
                match event {
                    Ok(event) => {
                        let frame = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize live event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Live viewer lagged behind the feed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // viewers only listen
                    Some(Err(_)) => break,
                }
            }
        }
    }

    debug!("Live viewer disconnected");
}
