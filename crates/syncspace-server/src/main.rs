//! SyncSpace Presence Relay Server
//!
//! Relays ephemeral presence between clients viewing the same project.
//! Shapes never pass through here; they live in the durable store.
//!
//! ## Protocol
//!
//! JSON text frames tagged by `type`:
//! ```json
//! { "type": "join_room", "roomId": "project-id" }
//! { "type": "user_joined", "roomId": "project-id", "id": "u1", "name": "Ada", "color": "#EF4444", "cursor": { "x": 0, "y": 0 } }
//! { "type": "cursor_move", "roomId": "project-id", "point": { "x": 100, "y": 200 }, "id": "u1" }
//! { "type": "leave_room", "roomId": "project-id" }
//! ```
//! The relay forwards `user_joined` and `cursor_move` to the rest of the
//! room without `roomId`, and sends `{ "type": "user_left", "id": ... }`
//! when a client leaves or disconnects.

mod config;
mod relay;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use config::{ConfigError, ServerConfig};
use futures_util::{SinkExt, StreamExt};
use relay::{Connection, Rooms};
use std::sync::Arc;
use syncspace_core::presence::ServerEvent;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncspace_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let rooms = Arc::new(Rooms::new(config.channel_capacity));
    let app = router(rooms);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("SyncSpace relay listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(rooms: Arc<Rooms>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(rooms)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(rooms): State<Arc<Rooms>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, rooms))
}

async fn handle_socket(socket: WebSocket, rooms: Arc<Rooms>) {
    let mut conn = Connection::new(Uuid::new_v4().to_string());
    info!("New connection: {}", conn.id());

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = conn.handle_text(&rooms, text.as_str()) {
                            if send(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary, ping, pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn.id(), e);
                        break;
                    }
                }
            }

            event = conn.recv() => {
                if send(&mut sender, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    conn.leave(&rooms);
    info!("Connection closed: {}", conn.id());
}

async fn send<S>(sender: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to encode {:?}: {}", event, e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
