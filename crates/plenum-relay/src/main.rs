//! Plenum Loopback Relay
//!
//! Forwards session bus publications between surfaces running as separate
//! processes. Every connection may join one channel; a publication is sent to
//! every other connection joined to the channel it names. Payloads are passed
//! through untouched.
//!
//! ## Protocol
//!
//! ```json
//! { "type": "join", "channel": "session-42" }
//! { "type": "leave" }
//! { "type": "publish", "channel": "session-42", "from": "<peer>", "payload": { "type": "slide", "slide": 3 } }
//! ```

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "plenum-relay", about = "Loopback relay for the plenum session bus")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 3030)]
    port: u16,
}

/// Frames sent by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Start receiving a channel
    Join { channel: String },
    /// Stop receiving
    Leave,
    /// Forward a payload to the channel
    Publish {
        channel: String,
        from: String,
        payload: serde_json::Value,
    },
}

/// Frames sent to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Confirm channel join
    Joined { channel: String, peer_count: usize },
    /// Another connection joined the channel
    PeerJoined { connection: String },
    /// Another connection left the channel
    PeerLeft { connection: String },
    /// Publication from another connection
    Message {
        channel: String,
        from: String,
        payload: serde_json::Value,
    },
    /// Error message
    Error { message: String },
}

/// Channel state
struct Room {
    /// Fan-out to joined connections, tagged with the sending connection
    tx: broadcast::Sender<(String, ServerFrame)>,
    /// Joined connection IDs
    members: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            members: HashSet::new(),
        }
    }
}

/// Shared application state
struct AppState {
    rooms: DashMap<String, Room>,
}

impl AppState {
    fn new() -> Self {
        Self { rooms: DashMap::new() }
    }

    /// Add a connection to a channel
    fn join(&self, channel: &str, connection: &str) -> (broadcast::Receiver<(String, ServerFrame)>, usize) {
        let mut room = self.rooms.entry(channel.to_string()).or_insert_with(Room::new);
        room.members.insert(connection.to_string());
        (room.tx.subscribe(), room.members.len())
    }

    /// Remove a connection from a channel
    fn leave(&self, channel: &str, connection: &str) {
        if let Some(mut room) = self.rooms.get_mut(channel) {
            room.members.remove(connection);
        }
        // Clean up empty channels atomically
        self.rooms.remove_if(channel, |_, room| room.members.is_empty());
    }

    /// Send to every connection joined to `channel`. Dropped if nobody is.
    fn broadcast(&self, channel: &str, from: &str, frame: ServerFrame) {
        if let Some(room) = self.rooms.get(channel) {
            let _ = room.tx.send((from.to_string(), frame));
        }
    }

    fn member_count(&self, channel: &str) -> usize {
        self.rooms.get(channel).map_or(0, |room| room.members.len())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plenum_relay=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from((args.host, args.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Plenum relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Relay stopped: {}", e);
        std::process::exit(1);
    }
}

/// Index page
async fn index() -> &'static str {
    "Plenum Relay - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(frame: &ServerFrame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode frame: {}", e);
            None
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection = Uuid::new_v4().to_string();
    info!("New connection: {}", connection);

    let (mut sender, mut receiver) = socket.split();
    let mut current: Option<String> = None;
    let mut channel_rx: Option<broadcast::Receiver<(String, ServerFrame)>> = None;

    loop {
        tokio::select! {
            // Handle incoming frames from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Join { channel }) => {
                                if let Some(old) = current.take() {
                                    state.leave(&old, &connection);
                                    state.broadcast(&old, &connection, ServerFrame::PeerLeft {
                                        connection: connection.clone(),
                                    });
                                }

                                let (rx, peer_count) = state.join(&channel, &connection);
                                channel_rx = Some(rx);
                                current = Some(channel.clone());

                                let joined = ServerFrame::Joined { channel: channel.clone(), peer_count };
                                if let Some(msg) = encode(&joined) {
                                    if sender.send(msg).await.is_err() {
                                        break;
                                    }
                                }

                                state.broadcast(&channel, &connection, ServerFrame::PeerJoined {
                                    connection: connection.clone(),
                                });
                                info!("Connection {} joined channel {}", connection, channel);
                            }
                            Ok(ClientFrame::Leave) => {
                                if let Some(channel) = current.take() {
                                    state.leave(&channel, &connection);
                                    state.broadcast(&channel, &connection, ServerFrame::PeerLeft {
                                        connection: connection.clone(),
                                    });
                                    info!("Connection {} left channel {}", connection, channel);
                                }
                                channel_rx = None;
                            }
                            Ok(ClientFrame::Publish { channel, from, payload }) => {
                                debug!("Publish on {} from {}", channel, from);
                                state.broadcast(&channel, &connection, ServerFrame::Message {
                                    channel: channel.clone(),
                                    from,
                                    payload,
                                });
                            }
                            Err(e) => {
                                warn!("Invalid frame from {}: {}", connection, e);
                                let err = ServerFrame::Error {
                                    message: format!("Invalid frame: {}", e),
                                };
                                if let Some(msg) = encode(&err) {
                                    let _ = sender.send(msg).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", connection, e);
                        break;
                    }
                }
            }

            // Forward frames from the joined channel
            msg = async {
                match &mut channel_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match msg {
                    // Don't echo back to the sending connection
                    Ok((from, frame)) if from != connection => {
                        if let Some(msg) = encode(&frame) {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Connection {} missed {} frames", connection, missed);
                    }
                    Err(RecvError::Closed) => {
                        channel_rx = None;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(channel) = current {
        state.leave(&channel, &connection);
        state.broadcast(&channel, &connection, ServerFrame::PeerLeft {
            connection: connection.clone(),
        });
    }
    info!("Connection closed: {}", connection);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_leave_tracks_members() {
        let state = AppState::new();
        let (_rx1, count) = state.join("s42", "a");
        assert_eq!(count, 1);
        let (_rx2, count) = state.join("s42", "b");
        assert_eq!(count, 2);

        state.leave("s42", "a");
        assert_eq!(state.member_count("s42"), 1);
        state.leave("s42", "b");
        assert!(state.rooms.get("s42").is_none());
    }

    #[test]
    fn test_leave_keeps_room_rejoined_meanwhile() {
        let state = AppState::new();
        let (_rx_a, _) = state.join("s42", "a");
        state.leave("s42", "a");
        let (mut rx_b, count) = state.join("s42", "b");
        assert_eq!(count, 1);

        // A stale leave for the old member must not drop b's room.
        state.leave("s42", "a");
        assert_eq!(state.member_count("s42"), 1);
        state.broadcast("s42", "c", ServerFrame::PeerJoined {
            connection: "c".to_string(),
        });
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_reaches_channel_only() {
        let state = AppState::new();
        let (mut rx_a, _) = state.join("s42", "a");
        let (mut rx_other, _) = state.join("s7", "c");

        state.broadcast("s42", "b", ServerFrame::PeerJoined {
            connection: "b".to_string(),
        });

        let (from, frame) = rx_a.try_recv().unwrap();
        assert_eq!(from, "b");
        assert!(matches!(frame, ServerFrame::PeerJoined { .. }));
        assert!(rx_other.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_without_room_is_dropped() {
        let state = AppState::new();
        state.broadcast("nobody", "a", ServerFrame::Error {
            message: "x".to_string(),
        });
        assert_eq!(state.member_count("nobody"), 0);
    }

    #[test]
    fn test_publish_frame_decodes_with_opaque_payload() {
        let json = r#"{"type":"publish","channel":"s42","from":"p1",
            "payload":{"type":"some-future-message","weird":[1,2]}}"#;
        match serde_json::from_str::<ClientFrame>(json).unwrap() {
            ClientFrame::Publish { channel, from, payload } => {
                assert_eq!(channel, "s42");
                assert_eq!(from, "p1");
                assert_eq!(payload["weird"][1], 2);
            }
            other => panic!("Wrong frame: {:?}", other),
        }
    }

    #[test]
    fn test_server_frame_encoding() {
        let frame = ServerFrame::Joined {
            channel: "s42".to_string(),
            peer_count: 2,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "joined");
        assert_eq!(json["peerCount"], 2);
    }
}
