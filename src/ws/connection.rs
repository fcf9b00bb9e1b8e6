//! WebSocket connection lifecycle management.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use futures::{SinkExt, StreamExt};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::hub::{ClientEvent, Hub, ServerEvent};

pub fn router(hub: Arc<Hub>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

pub async fn ws_handler(State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(hub, socket))
}

async fn handle_socket(hub: Arc<Hub>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_id, mut events) = hub.join();
    tracing::info!(%client_id, clients = hub.len(), "client connected");

    let forward = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else { continue };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::SendMessage(data)) => {
                    let delivered =
                        hub.broadcast_from(client_id, &ServerEvent::ReceiveMessage(data));
                    tracing::debug!(%client_id, delivered, "relayed message");
                }
                Err(err) => {
                    hub.send_to(client_id, ServerEvent::Error(format!("bad message: {err}")));
                }
            },
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    hub.leave(client_id);
    forward.abort();
    tracing::info!(%client_id, clients = hub.len(), "client disconnected");
}
